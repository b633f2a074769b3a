use crate::core::analytics::LibraryAnalytics;
use crate::domain::model::{
    parse_timestamp, Book, BookRow, Catalog, CatalogFeed, CirculationRow, IngestSummary, Member,
    MemberRow,
};
use crate::domain::ports::RecordPolicy;
use crate::utils::error::{AnalyticsError, Result};
use crate::utils::validation::{is_valid_email, is_valid_isbn};
use serde::de::DeserializeOwned;

pub const BOOKS_FILE: &str = "books.csv";
pub const MEMBERS_FILE: &str = "members.csv";
pub const CHECKOUTS_FILE: &str = "checkouts.csv";
pub const RETURNS_FILE: &str = "returns.csv";

/// Parses one catalog table. Rows that fail to deserialize are skipped or
/// abort the load, depending on `policy`.
pub fn parse_csv_table<T: DeserializeOwned>(
    table: &str,
    data: &[u8],
    policy: RecordPolicy,
    invalid_rows: &mut usize,
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let parsed = match record {
            Ok(record) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                record
                    .deserialize::<T>(Some(&headers))
                    .map_err(|e| (line, e.to_string()))
            }
            Err(e) => Err((e.position().map(|p| p.line()).unwrap_or(0), e.to_string())),
        };

        match parsed {
            Ok(row) => rows.push(row),
            Err((line, reason)) => reject(table, line, reason, policy, invalid_rows)?,
        }
    }

    tracing::debug!("Parsed {} rows from {}", rows.len(), table);
    Ok(rows)
}

/// Converts one table of the JSON feed. Rows are numbered from 1 in feed
/// order.
pub fn parse_json_table<T: DeserializeOwned>(
    table: &str,
    values: Vec<serde_json::Value>,
    policy: RecordPolicy,
    invalid_rows: &mut usize,
) -> Result<Vec<T>> {
    let mut rows = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(row) => rows.push(row),
            Err(e) => reject(table, index as u64 + 1, e.to_string(), policy, invalid_rows)?,
        }
    }

    tracing::debug!("Parsed {} rows from feed table {}", rows.len(), table);
    Ok(rows)
}

pub fn catalog_from_feed(feed: CatalogFeed, policy: RecordPolicy) -> Result<Catalog> {
    let mut invalid_rows = 0;

    let mut catalog = Catalog {
        books: parse_json_table(BOOKS_FILE, feed.books, policy, &mut invalid_rows)?,
        members: parse_json_table(MEMBERS_FILE, feed.members, policy, &mut invalid_rows)?,
        checkouts: parse_json_table(CHECKOUTS_FILE, feed.checkouts, policy, &mut invalid_rows)?,
        returns: parse_json_table(RETURNS_FILE, feed.returns, policy, &mut invalid_rows)?,
        ..Catalog::default()
    };
    catalog.invalid_rows = invalid_rows;
    Ok(catalog)
}

fn reject(
    table: &str,
    row: u64,
    reason: String,
    policy: RecordPolicy,
    invalid_rows: &mut usize,
) -> Result<()> {
    match policy {
        RecordPolicy::Fail => Err(AnalyticsError::InvalidRecordError {
            table: table.to_string(),
            row,
            reason,
        }),
        RecordPolicy::Skip => {
            tracing::warn!("⚠️ Skipping {} row {}: {}", table, row, reason);
            *invalid_rows += 1;
            Ok(())
        }
    }
}

fn check_book(row: &BookRow) -> std::result::Result<(), String> {
    if row.book_id.is_empty() {
        return Err("book_id is empty".to_string());
    }
    Ok(())
}

fn check_member(row: &MemberRow) -> std::result::Result<(), String> {
    if row.member_id.is_empty() {
        return Err("member_id is empty".to_string());
    }
    if !row.email.is_empty() && !is_valid_email(&row.email) {
        return Err(format!("member {} has an invalid email '{}'", row.member_id, row.email));
    }
    Ok(())
}

fn check_circulation(row: &CirculationRow) -> std::result::Result<(), String> {
    if row.member_id.is_empty() || row.book_id.is_empty() {
        return Err("member_id and book_id are required".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    // 同一時間點先借出再歸還
    Checkout,
    Return,
}

/// Replays a catalog into a fresh `LibraryAnalytics`.
///
/// Books and members are registered in catalog order. Checkouts and returns
/// are merged into one timeline ordered by date; the sort is stable, and a
/// checkout sorts before a return with the same timestamp.
pub fn replay(catalog: &Catalog, policy: RecordPolicy) -> Result<(LibraryAnalytics, IngestSummary)> {
    let mut analytics = LibraryAnalytics::new();
    let mut summary = IngestSummary {
        invalid_rows: catalog.invalid_rows,
        ..IngestSummary::default()
    };

    for (index, row) in catalog.books.iter().enumerate() {
        if let Err(reason) = check_book(row) {
            reject(BOOKS_FILE, index as u64 + 1, reason, policy, &mut summary.invalid_rows)?;
            continue;
        }
        if !row.isbn.is_empty() && !is_valid_isbn(&row.isbn) {
            tracing::warn!("⚠️ Book {} has an ISBN that fails its checksum: {}", row.book_id, row.isbn);
            summary.isbn_warnings += 1;
        }

        let book = Book::new(&row.book_id, &row.title, &row.author, &row.isbn);
        if analytics.add_book(book) {
            summary.books_loaded += 1;
        } else {
            tracing::warn!("⚠️ Duplicate book id {} ignored", row.book_id);
            summary.duplicate_books += 1;
        }
    }

    for (index, row) in catalog.members.iter().enumerate() {
        if let Err(reason) = check_member(row) {
            reject(MEMBERS_FILE, index as u64 + 1, reason, policy, &mut summary.invalid_rows)?;
            continue;
        }

        let member = Member::new(&row.member_id, &row.name, &row.email);
        if analytics.add_member(member) {
            summary.members_loaded += 1;
        } else {
            tracing::warn!("⚠️ Duplicate member id {} ignored", row.member_id);
            summary.duplicate_members += 1;
        }
    }

    let mut timeline: Vec<(EventKind, &CirculationRow)> = Vec::new();
    for (kind, table, rows) in [
        (EventKind::Checkout, CHECKOUTS_FILE, &catalog.checkouts),
        (EventKind::Return, RETURNS_FILE, &catalog.returns),
    ] {
        for (index, row) in rows.iter().enumerate() {
            match check_circulation(row) {
                Ok(()) => timeline.push((kind, row)),
                Err(reason) => {
                    reject(table, index as u64 + 1, reason, policy, &mut summary.invalid_rows)?
                }
            }
        }
    }
    timeline.sort_by_key(|(kind, row)| (row.date, *kind));

    for (kind, row) in timeline {
        match kind {
            EventKind::Checkout => {
                if analytics.process_checkout(&row.member_id, &row.book_id, row.date) {
                    summary.checkouts_applied += 1;
                } else {
                    tracing::warn!(
                        "⚠️ Checkout of {} by {} rejected: unknown member or book",
                        row.book_id,
                        row.member_id
                    );
                    summary.checkouts_rejected += 1;
                }
            }
            EventKind::Return => {
                if analytics.process_return(&row.member_id, &row.book_id) {
                    summary.returns_applied += 1;
                } else {
                    tracing::warn!(
                        "⚠️ Return of {} by {} rejected: book not held by member",
                        row.book_id,
                        row.member_id
                    );
                    summary.returns_rejected += 1;
                }
            }
        }
    }

    tracing::info!(
        "📚 Replayed {} books, {} members, {} checkouts ({} rejected), {} returns",
        summary.books_loaded,
        summary.members_loaded,
        summary.checkouts_applied,
        summary.checkouts_rejected,
        summary.returns_applied
    );

    Ok((analytics, summary))
}

/// Built-in demo catalog.
pub fn sample_catalog() -> Catalog {
    let books = [
        ("B001", "The Great Gatsby", "F. Scott Fitzgerald", "978-0-7432-7356-5"),
        ("B002", "1984", "George Orwell", "978-0-452-28423-4"),
        ("B003", "To Kill a Mockingbird", "Harper Lee", "978-0-06-112008-4"),
        ("B004", "Pride and Prejudice", "Jane Austen", "978-0-14-143951-8"),
        ("B005", "The Catcher in the Rye", "J.D. Salinger", "978-0-316-76948-0"),
    ];
    let members = [
        ("M001", "Alice Johnson", "alice@example.com"),
        ("M002", "Bob Smith", "bob@example.com"),
        ("M003", "Carol Davis", "carol@example.com"),
    ];
    let checkouts = [
        ("M001", "B001", "2025-12-05"),
        ("M001", "B002", "2025-12-10"),
        ("M002", "B001", "2025-12-06"),
        ("M002", "B003", "2025-12-12"),
        ("M003", "B004", "2025-12-08"),
        ("M001", "B004", "2025-12-15"),
    ];

    Catalog {
        books: books
            .iter()
            .map(|(book_id, title, author, isbn)| BookRow {
                book_id: book_id.to_string(),
                title: title.to_string(),
                author: author.to_string(),
                isbn: isbn.to_string(),
            })
            .collect(),
        members: members
            .iter()
            .map(|(member_id, name, email)| MemberRow {
                member_id: member_id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            })
            .collect(),
        checkouts: checkouts
            .iter()
            .filter_map(|(member_id, book_id, date)| {
                Some(CirculationRow {
                    member_id: member_id.to_string(),
                    book_id: book_id.to_string(),
                    date: parse_timestamp(date)?,
                })
            })
            .collect(),
        returns: Vec::new(),
        invalid_rows: 0,
    }
}
