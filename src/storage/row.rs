use std::fmt;

/// Longest username accepted by `insert`, in bytes.
pub const COLUMN_USERNAME_SIZE: usize = 32;
/// Longest email accepted by `insert`, in bytes.
pub const COLUMN_EMAIL_SIZE: usize = 255;

// Serialized row layout. Both string columns carry one extra byte so a
// maximum-length value still ends in a zero, and shorter values are
// zero-padded to the full field width.
pub const ID_SIZE: usize = size_of::<u32>();
pub const USERNAME_SIZE: usize = COLUMN_USERNAME_SIZE + 1;
pub const EMAIL_SIZE: usize = COLUMN_EMAIL_SIZE + 1;
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// A single record of the one hard-wired table:
/// `(id INTEGER PRIMARY KEY, username VARCHAR(32), email VARCHAR(255))`.
#[derive(Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: [u8; USERNAME_SIZE],
    email: [u8; EMAIL_SIZE],
}

fn str_to_fixed_bytes<const N: usize>(input: &str) -> [u8; N] {
    let mut buffer = [0u8; N];
    let bytes = input.as_bytes();
    let len = bytes.len().min(N);
    buffer[..len].copy_from_slice(&bytes[..len]);
    buffer
}

fn fixed_bytes_to_string(buffer: &[u8]) -> String {
    String::from_utf8_lossy(buffer)
        .trim_end_matches(char::from(0))
        .to_string()
}

impl Row {
    /// Build a row from already-validated column values. Callers are
    /// expected to have checked the string lengths (the statement parser
    /// does); anything longer than the column width is cut off at it.
    pub fn new(id: u32, username: &str, email: &str) -> Self {
        Row {
            id,
            username: str_to_fixed_bytes(username),
            email: str_to_fixed_bytes(email),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn username(&self) -> String {
        fixed_bytes_to_string(&self.username)
    }

    pub fn email(&self) -> String {
        fixed_bytes_to_string(&self.email)
    }

    /// Write the packed `ROW_SIZE`-byte image of this row into `buf`.
    ///
    /// The id is stored in the host's byte order; a database file is not
    /// portable across endianness.
    pub fn serialize(&self, buf: &mut [u8]) {
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_ne_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
    }

    /// Rebuild a row from a packed image produced by [`Row::serialize`].
    pub fn deserialize(buf: &[u8]) -> Self {
        let id = u32::from_ne_bytes(buf[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());

        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);

        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);

        Row {
            id,
            username,
            email,
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("username", &self.username())
            .field("email", &self.email())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_size_matches_layout() {
        assert_eq!(ROW_SIZE, 293);
        assert_eq!(EMAIL_OFFSET + EMAIL_SIZE, ROW_SIZE);
    }

    #[test]
    fn serialize_round_trip() {
        let row = Row::new(42, "alice", "alice@example.com");
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        assert_eq!(Row::deserialize(&buf), row);
    }

    #[test]
    fn round_trip_at_maximum_lengths() {
        let username = "u".repeat(COLUMN_USERNAME_SIZE);
        let email = "e".repeat(COLUMN_EMAIL_SIZE);
        let row = Row::new(u32::MAX, &username, &email);
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);

        let back = Row::deserialize(&buf);
        assert_eq!(back.id(), u32::MAX);
        assert_eq!(back.username(), username);
        assert_eq!(back.email(), email);
    }

    #[test]
    fn round_trip_empty_strings() {
        let row = Row::new(0, "", "");
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);

        let back = Row::deserialize(&buf);
        assert_eq!(back.username(), "");
        assert_eq!(back.email(), "");
    }

    #[test]
    fn display_format() {
        let row = Row::new(1, "user1", "person1@example.com");
        assert_eq!(row.to_string(), "(1, user1, person1@example.com)");
    }
}
