// src/utils/html.rs

use crate::models::test::CreateTestRequest;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) stay, <script>/<iframe> and
/// event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes the display text of a new test.
///
/// Only text that is rendered is cleaned. Correct answers and option texts
/// take part in comparisons, so they must keep their exact value; option text
/// is escaped by the frontend instead.
///
/// Run this before validating: markup that cleans down to nothing must fail
/// the length checks.
pub fn sanitize_test(mut req: CreateTestRequest) -> CreateTestRequest {
    req.title = clean_html(&req.title);
    req.description = req.description.as_deref().map(clean_html);
    for q in &mut req.questions {
        q.content = clean_html(&q.content);
    }
    req
}
