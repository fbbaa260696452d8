use csv_async::ByteRecord;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Number of columns every data row must carry.
pub const COLUMN_COUNT: usize = 7;

/// Positional schema of a data row.
pub mod column {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const EMAIL: usize = 2;
    pub const INCOME: usize = 3;
    pub const CREDIT_SCORE: usize = 4;
    pub const STATUS: usize = 5;
    pub const AGE: usize = 6;
}

/// Column names of the header row, in order.
pub const HEADER: [&str; COLUMN_COUNT] = [
    "id",
    "name",
    "email",
    "monthly_income",
    "credit_score",
    "employment_status",
    "age",
];

/// Check that the first row of a source is a header and not data.
///
/// Column names are not compared; the row must have the data width and its
/// id column must not hold a UUID.
pub fn check_header(header: &ByteRecord) -> Result<(), String> {
    if header.is_empty() {
        return Err("source is empty".into());
    }
    if header.len() != COLUMN_COUNT {
        return Err(format!(
            "expected {COLUMN_COUNT} columns, got {}",
            header.len()
        ));
    }
    let id = header
        .get(column::ID)
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    if Uuid::parse_str(id.trim()).is_ok() {
        return Err(format!("first row starts with id {:?}", id.trim()));
    }
    Ok(())
}

/// A user row that passed validation and may be handed to a [`crate::Sink`].
///
/// `id` and `email` are always present. The numeric fields are best-effort:
/// anything that does not parse is stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub monthly_income: f64,
    pub credit_score: i32,
    pub employment_status: String,
    pub age: i32,
}

/// Why a row did not become a [`UserRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The row does not have the expected column shape. Counted as failed.
    #[error("malformed row: {0}")]
    Malformed(String),
    /// The row has the right shape but a required field is unusable. Counted as skipped.
    #[error("invalid row: {0}")]
    Invalid(String),
}

impl Rejection {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Rejection::Malformed(_))
    }
}

/// Parse and validate one raw data row.
///
/// Fields are trimmed before inspection. Only a missing email or an
/// unparseable id reject the row; an empty email wins over a bad id.
pub fn parse_row(row: &ByteRecord) -> Result<UserRecord, Rejection> {
    if row.len() != COLUMN_COUNT {
        return Err(Rejection::Malformed(format!(
            "expected {COLUMN_COUNT} fields, got {}",
            row.len()
        )));
    }

    let mut fields = [""; COLUMN_COUNT];
    for (idx, raw) in row.iter().enumerate() {
        fields[idx] = std::str::from_utf8(raw)
            .map_err(|e| Rejection::Malformed(format!("field {idx} is not UTF-8: {e}")))?
            .trim();
    }

    let email = fields[column::EMAIL];
    if email.is_empty() {
        return Err(Rejection::Invalid("empty email".into()));
    }

    let id = Uuid::parse_str(fields[column::ID])
        .map_err(|e| Rejection::Invalid(format!("bad id {:?}: {e}", fields[column::ID])))?;

    Ok(UserRecord {
        id,
        name: fields[column::NAME].to_string(),
        email: email.to_string(),
        monthly_income: fields[column::INCOME].parse().unwrap_or(0.0),
        credit_score: fields[column::CREDIT_SCORE].parse().unwrap_or(0),
        employment_status: fields[column::STATUS].to_string(),
        age: fields[column::AGE].parse().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6f1c2a4e-9b1d-4c3a-8e7f-0a1b2c3d4e5f";

    fn row(fields: &[&str]) -> ByteRecord {
        let mut rec = ByteRecord::new();
        for f in fields {
            rec.push_field(f.as_bytes());
        }
        rec
    }

    #[test]
    fn header_row_is_accepted() {
        assert!(check_header(&row(&HEADER)).is_ok());
        assert!(check_header(&row(&["ID", "Name", "E-mail", "a", "b", "c", "d"])).is_ok());
    }

    #[test]
    fn data_row_or_wrong_width_is_not_a_header() {
        let data = [ID, "Bob", "bob@example.com", "1", "2", "x", "3"];
        assert!(check_header(&row(&data)).is_err());
        assert!(check_header(&row(&HEADER[..3])).is_err());
        assert!(check_header(&ByteRecord::new()).is_err());
    }

    #[test]
    fn parses_and_trims_a_complete_row() {
        let rec = parse_row(&row(&[
            &format!("  {ID} "),
            " Ada Lovelace ",
            " ada@example.com",
            "5400.50",
            " 780 ",
            "employed",
            "36",
        ]))
        .unwrap();

        assert_eq!(rec.id, Uuid::parse_str(ID).unwrap());
        assert_eq!(rec.name, "Ada Lovelace");
        assert_eq!(rec.email, "ada@example.com");
        assert_eq!(rec.monthly_income, 5400.50);
        assert_eq!(rec.credit_score, 780);
        assert_eq!(rec.employment_status, "employed");
        assert_eq!(rec.age, 36);
    }

    #[test]
    fn bad_numbers_default_to_zero() {
        let rec = parse_row(&row(&[ID, "Bob", "bob@example.com", "lots", "n/a", "", "forty"]))
            .unwrap();
        assert_eq!(rec.monthly_income, 0.0);
        assert_eq!(rec.credit_score, 0);
        assert_eq!(rec.age, 0);
    }

    #[test]
    fn empty_email_is_invalid_even_with_bad_id() {
        let err = parse_row(&row(&["not-a-uuid", "Bob", "   ", "1", "2", "x", "3"])).unwrap_err();
        assert_eq!(err, Rejection::Invalid("empty email".into()));
    }

    #[test]
    fn bad_id_is_invalid() {
        let err = parse_row(&row(&["1234", "Bob", "bob@example.com", "1", "2", "x", "3"]))
            .unwrap_err();
        assert!(!err.is_malformed());
    }

    #[test]
    fn wrong_width_is_malformed() {
        let err = parse_row(&row(&[ID, "Bob", "bob@example.com"])).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn non_utf8_field_is_malformed() {
        let mut rec = ByteRecord::new();
        rec.push_field(ID.as_bytes());
        rec.push_field(b"\xff\xfe");
        for f in ["bob@example.com", "1", "2", "x", "3"] {
            rec.push_field(f.as_bytes());
        }
        assert!(parse_row(&rec).unwrap_err().is_malformed());
    }
}
