use serde::{Deserialize, Serialize};

use crate::models::conversation::Conversation;

/// Which side of a conversation an identity acts as.
///
/// Every conversation has exactly two parties: the buyer (a plain user) and
/// the vendor (a store, acted for by its owner user). Threading this enum
/// through the services replaces `is_buyer`/`is_vendor` flags at every call
/// site and keeps the unread/archive field selection in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Buyer,
    Vendor,
}

impl Party {
    pub fn from_vendor_flag(as_vendor: bool) -> Self {
        if as_vendor {
            Party::Vendor
        } else {
            Party::Buyer
        }
    }

    pub fn counterpart(self) -> Self {
        match self {
            Party::Buyer => Party::Vendor,
            Party::Vendor => Party::Buyer,
        }
    }

    /// Direction flag carried on messages sent by this party.
    pub fn is_buyer(self) -> bool {
        matches!(self, Party::Buyer)
    }

    /// This party's own unread counter on a conversation.
    pub fn unread_count(self, conversation: &Conversation) -> i32 {
        match self {
            Party::Buyer => conversation.buyer_unread_count,
            Party::Vendor => conversation.vendor_unread_count,
        }
    }

    /// This party's archive flag on a conversation.
    pub fn is_archived(self, conversation: &Conversation) -> bool {
        match self {
            Party::Buyer => conversation.is_archived_by_buyer,
            Party::Vendor => conversation.is_archived_by_vendor,
        }
    }
}

impl std::str::FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Party::Buyer),
            "vendor" => Ok(Party::Vendor),
            other => Err(format!("unknown party: {}", other)),
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::Buyer => write!(f, "buyer"),
            Party::Vendor => write!(f, "vendor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn conversation() -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            product_id: None,
            last_message_at: Utc::now(),
            buyer_unread_count: 2,
            vendor_unread_count: 5,
            is_archived_by_buyer: true,
            is_archived_by_vendor: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn counterpart_flips_sides() {
        assert_eq!(Party::Buyer.counterpart(), Party::Vendor);
        assert_eq!(Party::Vendor.counterpart(), Party::Buyer);
    }

    #[test]
    fn unread_count_selects_own_counter() {
        let conv = conversation();
        assert_eq!(Party::Buyer.unread_count(&conv), 2);
        assert_eq!(Party::Vendor.unread_count(&conv), 5);
    }

    #[test]
    fn archive_flag_is_per_party() {
        let conv = conversation();
        assert!(Party::Buyer.is_archived(&conv));
        assert!(!Party::Vendor.is_archived(&conv));
    }

    #[test]
    fn parses_from_query_strings() {
        assert_eq!("buyer".parse::<Party>().unwrap(), Party::Buyer);
        assert_eq!("vendor".parse::<Party>().unwrap(), Party::Vendor);
        assert!("admin".parse::<Party>().is_err());
    }

    #[test]
    fn vendor_flag_mapping() {
        assert_eq!(Party::from_vendor_flag(false), Party::Buyer);
        assert_eq!(Party::from_vendor_flag(true), Party::Vendor);
        assert!(!Party::from_vendor_flag(true).is_buyer());
    }
}
