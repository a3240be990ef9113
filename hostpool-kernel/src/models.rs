use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Longueur max de l'identifiant public d'un host
pub const SHORT_ID_LEN: usize = 12;

/// Enregistrement interne d'un noeud participant, possédé par le store.
/// `uri` et `block_number` ne sortent jamais de la couche store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Vue publique d'un noeud, exposée sans authentification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub short_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub kind: String,
}

/// Projette un noeud interne vers sa vue publique (identifiant tronqué).
pub fn node_host(node: &Node) -> Host {
    Host {
        short_id: short_id(&node.id),
        last_seen: node.last_seen,
        kind: node.kind.clone(),
    }
}

fn short_id(id: &str) -> String {
    // coupe sur une frontière de caractère, jamais au milieu d'un code point
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => id[..end].to_string(),
        None => id.to_string(),
    }
}

// Message MQTT entrant (noeud → kernel)
#[derive(Debug, Deserialize)]
pub struct HeartbeatIn {
    pub node_id: String,
    pub kind: String,
    pub uri: Option<String>,
    pub block_number: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: "geth".to_string(),
            last_seen: datetime!(2024-03-01 12:00:00 UTC),
            uri: Some("enode://secret@10.0.0.1:30303".to_string()),
            block_number: Some(42),
        }
    }

    #[test]
    fn test_short_id_unchanged_when_short() {
        assert_eq!(node_host(&node("abc")).short_id, "abc");
        assert_eq!(node_host(&node("")).short_id, "");
        assert_eq!(node_host(&node("0123456789ab")).short_id, "0123456789ab");
    }

    #[test]
    fn test_short_id_truncated_to_twelve_chars() {
        assert_eq!(node_host(&node("0123456789abcdef")).short_id, "0123456789ab");
        assert_eq!(node_host(&node("node-0000001-aaaa")).short_id, "node-0000001");
    }

    #[test]
    fn test_short_id_counts_characters_not_bytes() {
        let host = node_host(&node("éééééééééééééé"));
        assert_eq!(host.short_id.chars().count(), SHORT_ID_LEN);
    }

    #[test]
    fn test_host_copies_fields_and_hides_internals() {
        let n = node("node-0000001-aaaa");
        let host = node_host(&n);
        assert_eq!(host.last_seen, n.last_seen);
        assert_eq!(host.kind, "geth");

        let json = serde_json::to_value(&host).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["last_seen"], "2024-03-01T12:00:00Z");
        assert!(!json.to_string().contains("enode"));
    }
}
