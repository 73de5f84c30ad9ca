//! Grant key construction and handling.

/// Rate-limit dimension a grant key belongs to.
///
/// Each class carries its own limit per chain; all classes share the same
/// trailing window and the same underlying store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// Destination wallet address
    Address,
    /// Source IP
    Ip,
    /// External identity id
    Identity,
}

impl KeyClass {
    fn as_str(&self) -> &'static str {
        match self {
            KeyClass::Address => "address",
            KeyClass::Ip => "ip",
            KeyClass::Identity => "identity",
        }
    }
}

/// A key that uniquely identifies one rate-limited subject on one chain.
///
/// Limits are independent per chain, so the chain name is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantKey {
    /// The chain this key's limit applies to
    pub chain: String,
    /// The rate-limit dimension
    pub class: KeyClass,
    /// The limited subject (an address, an IP, an identity id)
    pub subject: String,
}

impl GrantKey {
    /// Create a new grant key.
    pub fn new(chain: &str, class: KeyClass, subject: &str) -> Self {
        Self {
            chain: chain.to_string(),
            class,
            subject: subject.to_string(),
        }
    }

    /// Key for the destination-address class.
    pub fn address(chain: &str, address: &str) -> Self {
        Self::new(chain, KeyClass::Address, address)
    }

    /// Key for the source-IP class.
    pub fn ip(chain: &str, ip: &str) -> Self {
        Self::new(chain, KeyClass::Ip, ip)
    }

    /// Key for the external-identity class.
    pub fn identity(chain: &str, id: &str) -> Self {
        Self::new(chain, KeyClass::Identity, id)
    }

    /// Stable string encoding used as the storage key.
    pub fn to_storage_key(&self) -> String {
        format!("{}/{}/{}", self.chain, self.class.as_str(), self.subject)
    }
}

impl std::fmt::Display for GrantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_key_creation() {
        let key = GrantKey::address("testnet", "test1qqqq");

        assert_eq!(key.chain, "testnet");
        assert_eq!(key.class, KeyClass::Address);
        assert_eq!(key.subject, "test1qqqq");
    }

    #[test]
    fn test_storage_key_encoding() {
        let key = GrantKey::ip("testnet", "203.0.113.7");
        assert_eq!(key.to_storage_key(), "testnet/ip/203.0.113.7");
    }

    #[test]
    fn test_grant_key_equality() {
        let key1 = GrantKey::identity("testnet", "8675309");
        let key2 = GrantKey::identity("testnet", "8675309");

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_classes_are_independent() {
        let addr = GrantKey::address("testnet", "subject");
        let ip = GrantKey::ip("testnet", "subject");

        assert_ne!(addr, ip);
        assert_ne!(addr.to_storage_key(), ip.to_storage_key());
    }

    #[test]
    fn test_chains_are_independent() {
        let a = GrantKey::address("testnet", "test1qqqq");
        let b = GrantKey::address("devnet", "test1qqqq");

        assert_ne!(a.to_storage_key(), b.to_storage_key());
    }
}
