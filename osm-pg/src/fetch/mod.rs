//! Clients HTTP (Nominatim, Overpass) avec relances

pub mod nominatim;
pub mod overpass;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};

/// Attente fixe entre deux tentatives
pub const RETRY_WAIT: Duration = Duration::from_secs(2);

/// Marge ajoutée au timeout Overpass pour le timeout HTTP
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Client HTTP partagé par les appels d'une acquisition
pub struct HttpClient {
    client: Client,
    /// Nombre maximal de tentatives (au moins une)
    max_retries: u32,
    retry_wait: Duration,
}

/// Statuts transitoires (limitation de débit, serveur surchargé)
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

impl HttpClient {
    pub fn new(timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs) + HTTP_TIMEOUT_MARGIN)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("osm-pg/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries,
            retry_wait: RETRY_WAIT,
        })
    }

    /// Client préconfiguré (tests, proxy)
    pub fn with_client(client: Client, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            retry_wait: RETRY_WAIT,
        }
    }

    /// Remplace l'attente entre tentatives
    pub fn with_retry_wait(mut self, wait: Duration) -> Self {
        self.retry_wait = wait;
        self
    }

    /// Envoie une requête et retourne le corps de la réponse
    ///
    /// Les erreurs transitoires (429, 502, 503, 504, timeout, connexion)
    /// sont relancées ; `max_retries` borne le nombre total de tentatives.
    pub async fn fetch_text<F>(&self, what: &str, build: F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let retries_left = attempt < self.max_retries.max(1);

            match build(&self.client).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response
                            .text()
                            .await
                            .with_context(|| format!("Failed to read {} response", what))?;
                        debug!(what, attempt, bytes = body.len(), "HTTP response received");
                        return Ok(body);
                    }

                    if is_retryable_status(status) && retries_left {
                        warn!(what, attempt, %status, "Transient HTTP error, retrying");
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        let excerpt: String = body.chars().take(200).collect();
                        bail!("{} returned HTTP {}: {}", what, status, excerpt.trim());
                    }
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && retries_left => {
                    warn!(what, attempt, "Request failed, retrying: {}", e);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("{} request failed", what));
                }
            }

            tokio::time::sleep(self.retry_wait).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Serveur HTTP minimal pour les tests : répond dans l'ordre aux requêtes

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Client local sans proxy ni attente entre tentatives
    pub fn client(max_retries: u32) -> super::HttpClient {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        super::HttpClient::with_client(client, max_retries)
            .with_retry_wait(std::time::Duration::from_millis(10))
    }

    /// Démarre le serveur ; retourne l'URL de base et le compteur de requêtes
    pub async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    /// Lit les en-têtes puis le corps annoncé par Content-Length
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }
}
