use crate::core::analytics::LibraryAnalytics;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.f]` or `YYYY-MM-DD HH:MM:SS[.f]`.
/// A bare date maps to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date '{}'", raw)))
}

/// One entry of a book's checkout history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCheckout {
    pub member_id: String,
    pub checkout_date: NaiveDateTime,
}

/// One entry of a member's checkout history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCheckout {
    pub book_id: String,
    pub checkout_date: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_checkouts: u64,
    pub checkout_history: Vec<BookCheckout>,
    pub last_checkout: Option<NaiveDateTime>,
}

impl Book {
    pub fn new(
        book_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            total_checkouts: 0,
            checkout_history: Vec::new(),
            last_checkout: None,
        }
    }

    /// `last_checkout` 記錄最後一次處理的借出，而非最大日期
    pub fn record_checkout(&mut self, member_id: &str, checkout_date: NaiveDateTime) {
        self.total_checkouts += 1;
        self.checkout_history.push(BookCheckout {
            member_id: member_id.to_string(),
            checkout_date,
        });
        self.last_checkout = Some(checkout_date);
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            book_id: self.book_id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            total_checkouts: self.total_checkouts,
            last_checkout: self.last_checkout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub member_id: String,
    pub name: String,
    pub email: String,
    pub books_checked_out: Vec<String>,
    pub checkout_history: Vec<MemberCheckout>,
}

impl Member {
    pub fn new(
        member_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            name: name.into(),
            email: email.into(),
            books_checked_out: Vec::new(),
            checkout_history: Vec::new(),
        }
    }

    pub fn record_checkout(&mut self, book_id: &str, checkout_date: NaiveDateTime) {
        self.books_checked_out.push(book_id.to_string());
        self.checkout_history.push(MemberCheckout {
            book_id: book_id.to_string(),
            checkout_date,
        });
    }

    /// Removes one held copy of `book_id`. History is left untouched.
    pub fn return_book(&mut self, book_id: &str) -> bool {
        match self.books_checked_out.iter().position(|id| id == book_id) {
            Some(index) => {
                self.books_checked_out.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn total_checkouts(&self) -> usize {
        self.checkout_history.len()
    }

    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            member_id: self.member_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            books_currently_checked_out: self.books_checked_out.len(),
            total_checkouts: self.total_checkouts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_checkouts: u64,
    pub last_checkout: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_id: String,
    pub name: String,
    pub email: String,
    pub books_currently_checked_out: usize,
    pub total_checkouts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub total_books: usize,
    pub total_members: usize,
    pub total_checkouts: u64,
    pub average_checkouts_per_book: f64,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub timestamp: NaiveDateTime,
    pub statistics: UsageStatistics,
    pub most_popular_books: Vec<BookSummary>,
    pub most_active_members: Vec<MemberSummary>,
}

// 匯入用的原始資料列

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRow {
    pub book_id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    pub member_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// A checkout or a return. `date` is the checkout date or return date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirculationRow {
    pub member_id: String,
    pub book_id: String,
    #[serde(
        alias = "checkout_date",
        alias = "return_date",
        deserialize_with = "deserialize_timestamp"
    )]
    pub date: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub books: Vec<BookRow>,
    #[serde(default)]
    pub members: Vec<MemberRow>,
    #[serde(default)]
    pub checkouts: Vec<CirculationRow>,
    #[serde(default)]
    pub returns: Vec<CirculationRow>,
    /// Rows dropped while parsing the source files.
    #[serde(skip)]
    pub invalid_rows: usize,
}

/// The JSON catalog feed before row validation. Each table is kept as raw
/// values so one bad row does not fail the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFeed {
    #[serde(default)]
    pub books: Vec<serde_json::Value>,
    #[serde(default)]
    pub members: Vec<serde_json::Value>,
    #[serde(default)]
    pub checkouts: Vec<serde_json::Value>,
    #[serde(default)]
    pub returns: Vec<serde_json::Value>,
}

impl CatalogFeed {
    pub fn is_empty(&self) -> bool {
        self.books.is_empty() && self.members.is_empty() && self.checkouts.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub books_loaded: usize,
    pub duplicate_books: usize,
    pub members_loaded: usize,
    pub duplicate_members: usize,
    pub checkouts_applied: usize,
    pub checkouts_rejected: usize,
    pub returns_applied: usize,
    pub returns_rejected: usize,
    pub invalid_rows: usize,
    pub isbn_warnings: usize,
}

/// Output of the transform phase.
#[derive(Debug, Clone)]
pub struct AnalyticsResult {
    pub analytics: LibraryAnalytics,
    pub report: AnalyticsReport,
    pub summary: IngestSummary,
    pub popular_books_csv: String,
    pub active_members_csv: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(ts("2025-12-05"), ts("2025-12-05T00:00:00"));
        assert_eq!(ts("2025-12-05 10:30:00"), ts("2025-12-05T10:30:00"));
        assert!(parse_timestamp("2025-12-05T10:30:00.250").is_some());
        assert!(parse_timestamp("05/12/2025").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_book_tracks_last_processed_checkout() {
        let mut book = Book::new("B001", "The Great Gatsby", "F. Scott Fitzgerald", "");
        book.record_checkout("M001", ts("2025-12-10"));
        book.record_checkout("M002", ts("2025-12-05"));

        assert_eq!(book.total_checkouts, 2);
        assert_eq!(book.checkout_history[1].member_id, "M002");
        assert_eq!(book.last_checkout, Some(ts("2025-12-05")));
    }

    #[test]
    fn test_member_return_keeps_history() {
        let mut member = Member::new("M001", "Alice Johnson", "alice@example.com");
        member.record_checkout("B001", ts("2025-12-05"));
        member.record_checkout("B001", ts("2025-12-06"));

        assert!(member.return_book("B001"));
        assert_eq!(member.books_checked_out, vec!["B001".to_string()]);
        assert!(member.return_book("B001"));
        assert!(!member.return_book("B001"));
        assert_eq!(member.total_checkouts(), 2);

        let summary = member.summary();
        assert_eq!(summary.books_currently_checked_out, 0);
        assert_eq!(summary.total_checkouts, 2);
    }

    #[test]
    fn test_book_summary_serializes_null_last_checkout() {
        let book = Book::new("B002", "1984", "George Orwell", "978-0-452-28423-4");
        let json = serde_json::to_value(book.summary()).unwrap();

        assert_eq!(json["total_checkouts"], 0);
        assert!(json["last_checkout"].is_null());
    }

    #[test]
    fn test_circulation_row_accepts_date_aliases() {
        let row: CirculationRow = serde_json::from_value(serde_json::json!({
            "member_id": "M001",
            "book_id": "B001",
            "checkout_date": "2025-12-05"
        }))
        .unwrap();
        assert_eq!(row.date, ts("2025-12-05T00:00:00"));

        let bad = serde_json::from_value::<CirculationRow>(serde_json::json!({
            "member_id": "M001",
            "book_id": "B001",
            "date": "yesterday"
        }));
        assert!(bad.is_err());
    }
}
