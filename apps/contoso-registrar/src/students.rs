//! Student listing: search, sort and paging state carried between requests

use serde::{Deserialize, Serialize};

use crate::db::{Student, StudentQuery, StudentRepository, StudentSort};
use crate::error::Result;
use crate::pagination::{Page, PageSize};

/// Query parameters of a student listing request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentListRequest {
    pub sort_order: Option<String>,
    /// Filter the previous page was rendered with
    pub current_filter: Option<String>,
    /// Newly submitted search text
    pub search_string: Option<String>,
    pub page_number: Option<i64>,
}

/// What the listing resolved to, including the links the view renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentListView {
    pub students: Page<Student>,
    pub current_sort: String,
    /// `sort_order` for the last-name column header
    pub name_sort_param: &'static str,
    /// `sort_order` for the enrollment-date column header
    pub date_sort_param: &'static str,
    /// Filter to carry into the paging links
    pub current_filter: Option<String>,
}

impl StudentListRequest {
    /// A submitted search starts over at page 1; otherwise the previous
    /// filter stays in effect.
    pub fn resolve(&self) -> (StudentQuery, Option<i64>) {
        let sort = StudentSort::from_param(self.sort_order.as_deref().unwrap_or_default());
        let (filter, page_number) = match &self.search_string {
            Some(search) => (Some(search.clone()), Some(1)),
            None => (self.current_filter.clone(), self.page_number),
        };

        (StudentQuery { filter, sort }, page_number)
    }

    fn name_sort_param(&self) -> &'static str {
        match self.sort_order.as_deref() {
            None | Some("") => "name_desc",
            Some(_) => "",
        }
    }

    fn date_sort_param(&self) -> &'static str {
        if self.sort_order.as_deref() == Some("Date") {
            "date_desc"
        } else {
            "Date"
        }
    }
}

/// Build one page of the student listing
pub async fn list_students(
    repo: &StudentRepository<'_>,
    request: &StudentListRequest,
    page_size: PageSize,
) -> Result<StudentListView> {
    let (query, page_number) = request.resolve();
    let current_filter = query.filter.clone();

    tracing::debug!(
        sort = ?query.sort,
        filter = ?current_filter,
        page = ?page_number,
        "Listing students"
    );

    let listing = repo.listing(query);
    let students = Page::create(&listing, page_number, page_size).await?;

    Ok(StudentListView {
        students,
        current_sort: request.sort_order.clone().unwrap_or_default(),
        name_sort_param: request.name_sort_param(),
        date_sort_param: request.date_sort_param(),
        current_filter,
    })
}
