//! Types d'erreurs pour le crate overpass

use thiserror::Error;

/// Erreurs pouvant survenir lors de la construction d'une requête ou du parsing
#[derive(Debug, Error)]
pub enum OverpassError {
    /// Réponse JSON illisible
    #[error("Invalid Overpass JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Le serveur a renvoyé une erreur d'exécution (timeout, mémoire, ...)
    #[error("Overpass runtime error: {0}")]
    Remote(String),

    /// Aucun tag actif dans le filtre
    #[error("Tag filter selects nothing: at least one tag must be enabled")]
    EmptyFilter,

    /// Clé ou valeur de tag inutilisable dans une requête Overpass QL
    #[error("Invalid tag filter '{key}': {reason}")]
    InvalidTag { key: String, reason: String },

    /// Zone de recherche invalide
    #[error("Invalid search area: {0}")]
    InvalidArea(String),

    /// Géométrie impossible à construire pour un élément
    #[error("Invalid geometry for {element_id}: {reason}")]
    InvalidGeometry { element_id: String, reason: String },
}

impl OverpassError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(element_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            element_id: element_id.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de tag invalide
    pub fn invalid_tag(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTag {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
