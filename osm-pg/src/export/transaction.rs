//! Transaction atomique pour le chargement d'une table
//!
//! Tout le chargement (préparation de la table, COPY, fusion) est validé ou
//! annulé d'un bloc.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Transaction};
use tracing::{error, info};

/// Statut d'un chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Chargement validé
    Committed,
    /// Chargement annulé (rollback)
    RolledBack,
}

/// Rapport de chargement
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Table cible (`schema.table`)
    pub target: String,
    /// Lignes insérées dans la table cible
    pub rows: u64,
    /// Raison de l'annulation
    pub error: Option<String>,
    pub status: LoadStatus,
}

/// Transaction de chargement
///
/// Encapsule une transaction PostgreSQL ; si elle est abandonnée sans
/// `commit`, PostgreSQL l'annule à la fermeture.
pub struct LoadTransaction<'a> {
    transaction: Transaction<'a>,
    target: String,
    rows: u64,
}

impl<'a> LoadTransaction<'a> {
    /// Démarre une transaction sur `client`
    pub async fn begin(client: &'a mut Object, target: &str) -> Result<Self> {
        let transaction = client
            .transaction()
            .await
            .context("Failed to begin transaction")?;

        info!(target = %target, "Starting load transaction");

        Ok(Self {
            transaction,
            target: target.to_string(),
            rows: 0,
        })
    }

    /// Accède à la transaction sous-jacente pour exécuter des requêtes
    pub fn transaction(&self) -> &Transaction<'a> {
        &self.transaction
    }

    /// Enregistre les lignes insérées
    pub fn record_rows(&mut self, rows: u64) {
        self.rows += rows;
    }

    /// Valide la transaction
    pub async fn commit(self) -> Result<LoadReport> {
        self.transaction
            .commit()
            .await
            .with_context(|| format!("Failed to commit load into {}", self.target))?;

        info!(target = %self.target, rows = self.rows, "Load transaction committed");

        Ok(LoadReport {
            target: self.target,
            rows: self.rows,
            error: None,
            status: LoadStatus::Committed,
        })
    }

    /// Annule la transaction
    pub async fn rollback(self, reason: &str) -> LoadReport {
        error!(
            target = %self.target,
            reason = %reason,
            rows_attempted = self.rows,
            "Rolling back load"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (server will discard the transaction)");
        }

        LoadReport {
            target: self.target,
            rows: 0,
            error: Some(reason.to_string()),
            status: LoadStatus::RolledBack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_debug() {
        let report = LoadReport {
            target: "public.osm_features".to_string(),
            rows: 100,
            error: None,
            status: LoadStatus::Committed,
        };
        let debug_str = format!("{:?}", report);
        assert!(debug_str.contains("public.osm_features"));
        assert!(debug_str.contains("Committed"));
    }
}
