//! Standardisation des noms de colonnes et des valeurs horodatées

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};
use regex::Regex;
use serde_json::{Map, Value};

/// Nom réservé à la colonne géométrique de la table cible
const RESERVED: &str = "geometry";
const TIMESTAMP_COLUMN: &str = "timestamp";

/// Formats avec décalage horaire, hors RFC 3339 strict
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%z"];

/// Formats sans fuseau, interprétés en UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%MZ",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalise les noms d'attributs en identifiants SQL sûrs
pub struct ColumnStandardizer {
    invalid_chars: Regex,
}

impl ColumnStandardizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            invalid_chars: Regex::new(r"[^a-z0-9_]+").context("Invalid column regex")?,
        })
    }

    /// `addr:street` → `addr_street`, `2nd Name` → `_2nd_name`
    pub fn normalize_name(&self, name: &str) -> String {
        let lower = name.trim().to_lowercase();
        let replaced = self.invalid_chars.replace_all(&lower, "_");
        let trimmed = replaced.trim_matches('_');

        let mut out = if trimmed.is_empty() {
            "column".to_string()
        } else {
            trimmed.to_string()
        };
        if out.starts_with(|c: char| c.is_ascii_digit()) {
            out.insert(0, '_');
        }
        if out == RESERVED {
            out.push_str("_attr");
        }
        out
    }

    /// Associe chaque nom d'origine à un nom normalisé unique
    ///
    /// Les collisions sont suffixées `_2`, `_3`, ... dans l'ordre des noms
    /// d'origine, ce qui rend le résultat indépendant de l'ordre des features.
    pub fn build_mapping<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, String> {
        let originals: BTreeSet<&str> = names.into_iter().collect();
        let mut taken: HashSet<String> = HashSet::with_capacity(originals.len());
        let mut mapping = BTreeMap::new();

        for original in originals {
            let base = self.normalize_name(original);
            let mut candidate = base.clone();
            let mut suffix = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            taken.insert(candidate.clone());
            mapping.insert(original.to_string(), candidate);
        }

        mapping
    }

    /// Renomme les propriétés d'une feature selon `mapping`
    pub fn apply(
        &self,
        properties: Map<String, Value>,
        mapping: &BTreeMap<String, String>,
    ) -> Map<String, Value> {
        properties
            .into_iter()
            .map(|(key, value)| {
                let name = mapping
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| self.normalize_name(&key));
                let value = if name == TIMESTAMP_COLUMN {
                    self.normalize_timestamp(value)
                } else {
                    value
                };
                (name, value)
            })
            .collect()
    }

    /// Convertit une date/heure en RFC 3339 ; les valeurs non reconnues sont conservées
    pub fn normalize_timestamp(&self, value: Value) -> Value {
        match value {
            Value::String(raw) => Value::String(self.rfc3339(&raw).unwrap_or(raw)),
            other => other,
        }
    }

    fn rfc3339(&self, raw: &str) -> Option<String> {
        parse_timestamp(raw.trim()).map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

/// Date/heure valide du calendrier ; sans fuseau, UTC est supposé
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(raw, f).ok())
    {
        return Some(dt);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().fixed_offset())
}
