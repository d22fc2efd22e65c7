//! # Idempotency Marker Module
//!
//! Sostituisce il vecchio state file locale: l'unico stato che sopravvive a un
//! run è la entry di metadata `optimized = "true"` sull'oggetto remoto.
//!
//! ## Regole:
//! - Un oggetto con la entry (qualunque valore) è escluso dai candidati futuri
//! - La entry viene scritta solo dentro il commit, nella stessa `put` che
//!   sostituisce il contenuto
//! - Non esiste un percorso "marca senza ottimizzare"

use std::collections::HashMap;

/// Metadata key persisted on every committed object
pub const MARKER_KEY: &str = "optimized";
/// Value written under [`MARKER_KEY`]
pub const MARKER_VALUE: &str = "true";

/// Object metadata as exposed by the store (unordered key → value)
pub type Metadata = HashMap<String, String>;

/// Whether the object was already optimized by a previous run.
///
/// Only the key is checked: a marker written by an older tool version with a
/// different value still excludes the object.
pub fn has_marker(metadata: &Metadata) -> bool {
    metadata.contains_key(MARKER_KEY)
}

/// Existing entries plus the marker, ready to be folded into the commit write
pub fn with_marker(metadata: &Metadata) -> Metadata {
    let mut tagged = metadata.clone();
    tagged.insert(MARKER_KEY.to_string(), MARKER_VALUE.to_string());
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_marker_checks_key_only() {
        let mut metadata = Metadata::new();
        assert!(!has_marker(&metadata));
        metadata.insert(MARKER_KEY.to_string(), "false".to_string());
        assert!(has_marker(&metadata));
    }

    #[test]
    fn test_with_marker_preserves_entries() {
        let mut metadata = Metadata::new();
        metadata.insert("owner".to_string(), "marketing".to_string());
        metadata.insert(MARKER_KEY.to_string(), "stale".to_string());

        let tagged = with_marker(&metadata);
        assert_eq!(tagged.get("owner").map(String::as_str), Some("marketing"));
        assert_eq!(tagged.get(MARKER_KEY).map(String::as_str), Some(MARKER_VALUE));
        assert_eq!(tagged.len(), 2);
        // input untouched
        assert_eq!(metadata.get(MARKER_KEY).map(String::as_str), Some("stale"));
    }
}
