//! Row identifiers.
//!
//! Items get UUIDv7 ids, so ordering a listing by id follows creation time and
//! pages stay stable while new items are appended. Users get random v4 ids.

use uuid::Uuid;

pub fn new_item_id() -> Uuid {
    Uuid::now_v7()
}

pub fn new_user_id() -> Uuid {
    Uuid::new_v4()
}

/// Parse a caller-supplied id. `None` if it is not a UUID.
pub fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_time_ordered() {
        let a = new_item_id();
        let b = new_item_id();
        assert_eq!(a.get_version(), Some(uuid::Version::SortRand));
        assert!(b > a);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn user_ids_are_random() {
        assert_eq!(new_user_id().get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn parse_round_trips_and_rejects_junk() {
        let id = new_item_id();
        assert_eq!(parse_id(&id.to_string()), Some(id));
        assert_eq!(parse_id("item-1"), None);
        assert_eq!(parse_id(""), None);
    }
}
