use rand::Rng;

const ROOM_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier of the direct-message room shared by `a` and `b`.
///
/// Depends only on the unordered pair. The first name is length-prefixed so
/// names containing the separator can't alias another pair.
pub fn dm_room_id(a: &str, b: &str) -> String {
    let (x, y) = if a <= b { (a, b) } else { (b, a) };
    format!("dm-{}:{x}#{y}", x.chars().count())
}

pub fn dm_room_name(owner: &str, invitee: &str) -> String {
    format!("{owner} & {invitee}")
}

/// Fresh `room-xxxxxx` id for a public room.
pub fn random_room_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect();
    format!("room-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_id_is_order_independent() {
        assert_eq!(dm_room_id("Ana", "Beto"), dm_room_id("Beto", "Ana"));
        assert_eq!(dm_room_id("Ana", "Beto"), "dm-3:Ana#Beto");
    }

    #[test]
    fn dm_id_does_not_alias_on_separator() {
        assert_ne!(dm_room_id("a#b", "c"), dm_room_id("a", "b#c"));
    }

    #[test]
    fn random_ids_have_expected_shape() {
        let id = random_room_id();
        assert!(id.starts_with("room-"));
        assert_eq!(id.len(), 11);
        assert!(id[5..].bytes().all(|b| ROOM_ID_ALPHABET.contains(&b)));
    }
}
