use crate::domain::model::{
    AnalyticsReport, Book, BookSummary, Member, MemberCheckout, MemberSummary, UsageStatistics,
};
use chrono::NaiveDateTime;
use indexmap::IndexMap;

pub const DEFAULT_TOP_LIMIT: usize = 10;

/// In-memory registry of books and members plus the usage queries built on
/// top of it. Registries keep insertion order, which is also the tie-break
/// order for the ranking queries.
#[derive(Debug, Default, Clone)]
pub struct LibraryAnalytics {
    books: IndexMap<String, Book>,
    members: IndexMap<String, Member>,
}

impl LibraryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_book(&mut self, book: Book) -> bool {
        if self.books.contains_key(&book.book_id) {
            return false;
        }
        self.books.insert(book.book_id.clone(), book);
        true
    }

    pub fn add_member(&mut self, member: Member) -> bool {
        if self.members.contains_key(&member.member_id) {
            return false;
        }
        self.members.insert(member.member_id.clone(), member);
        true
    }

    pub fn book(&self, book_id: &str) -> Option<&Book> {
        self.books.get(book_id)
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.get(member_id)
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn process_checkout(
        &mut self,
        member_id: &str,
        book_id: &str,
        checkout_date: NaiveDateTime,
    ) -> bool {
        let (Some(member), Some(book)) =
            (self.members.get_mut(member_id), self.books.get_mut(book_id))
        else {
            tracing::debug!(member_id, book_id, "checkout rejected: unknown member or book");
            return false;
        };

        member.record_checkout(book_id, checkout_date);
        book.record_checkout(member_id, checkout_date);
        true
    }

    pub fn process_return(&mut self, member_id: &str, book_id: &str) -> bool {
        match self.members.get_mut(member_id) {
            Some(member) => member.return_book(book_id),
            None => false,
        }
    }

    pub fn most_popular_books(&self, limit: usize) -> Vec<BookSummary> {
        let mut ranked: Vec<&Book> = self.books.values().collect();
        // sort_by 為穩定排序，同分時維持加入順序
        ranked.sort_by(|a, b| b.total_checkouts.cmp(&a.total_checkouts));
        ranked.into_iter().take(limit).map(Book::summary).collect()
    }

    pub fn most_active_members(&self, limit: usize) -> Vec<MemberSummary> {
        let mut ranked: Vec<&Member> = self.members.values().collect();
        ranked.sort_by(|a, b| b.total_checkouts().cmp(&a.total_checkouts()));
        ranked.into_iter().take(limit).map(Member::summary).collect()
    }

    pub fn books_by_author(&self, author: &str) -> Vec<BookSummary> {
        let wanted = author.to_lowercase();
        self.books
            .values()
            .filter(|book| book.author.to_lowercase() == wanted)
            .map(Book::summary)
            .collect()
    }

    pub fn member_checkout_history(&self, member_id: &str) -> Vec<MemberCheckout> {
        self.members
            .get(member_id)
            .map(|member| member.checkout_history.clone())
            .unwrap_or_default()
    }

    pub fn total_checkouts(&self) -> u64 {
        self.books.values().map(|book| book.total_checkouts).sum()
    }

    pub fn usage_statistics(&self, generated_at: NaiveDateTime) -> UsageStatistics {
        let total_books = self.books.len();
        let total_checkouts = self.total_checkouts();
        let average = if total_books > 0 {
            total_checkouts as f64 / total_books as f64
        } else {
            0.0
        };

        UsageStatistics {
            total_books,
            total_members: self.members.len(),
            total_checkouts,
            average_checkouts_per_book: round_to_cents(average),
            generated_at,
        }
    }

    pub fn build_report(&self, limit: usize, now: NaiveDateTime) -> AnalyticsReport {
        AnalyticsReport {
            timestamp: now,
            statistics: self.usage_statistics(now),
            most_popular_books: self.most_popular_books(limit),
            most_active_members: self.most_active_members(limit),
        }
    }
}

/// Two decimals, ties to even.
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
