use chrono::NaiveDate;

use crate::words::WordRow;

const EMAIL_STYLES: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; background: #f8fafc; margin: 0; padding: 20px; }
        .container { max-width: 600px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
        .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 2rem; text-align: center; }
        .header h1 { margin: 0 0 0.5rem 0; font-size: 2rem; font-weight: 700; }
        .header p { margin: 0; opacity: 0.9; }
        .content { padding: 2rem; }
        .word-section { background: #f8fafc; border-radius: 8px; padding: 1.5rem; margin-bottom: 1.5rem; }
        .word-term { font-size: 2.5rem; font-weight: 700; color: #1a202c; margin-bottom: 0.5rem; text-transform: capitalize; }
        .word-pronunciation { font-style: italic; color: #718096; margin-bottom: 1rem; font-size: 1.1rem; }
        .word-definition { color: #4a5568; margin-bottom: 1rem; font-size: 1.1rem; }
        .word-example { background: white; padding: 1rem; border-radius: 6px; border-left: 4px solid #667eea; font-style: italic; color: #4a5568; margin-bottom: 1rem; }
        .word-meta { text-align: center; margin-bottom: 1rem; }
        .badge { display: inline-block; padding: 0.25rem 0.75rem; border-radius: 20px; font-size: 0.8rem; font-weight: 500; text-transform: capitalize; }
        .category-badge { background: #e2e8f0; color: #4a5568; }
        .difficulty-beginner { background: #c6f6d5; color: #22543d; }
        .difficulty-intermediate { background: #fef5e7; color: #c05621; }
        .difficulty-advanced { background: #fed7d7; color: #c53030; }
        .difficulty-expert { background: #e9d8fd; color: #553c9a; }
        .footer { background: #f8fafc; padding: 1.5rem; text-align: center; color: #718096; font-size: 0.9rem; }
"#;

/// Render the word-of-the-day notification for one recipient name.
/// Pure formatting: no I/O, deterministic given its inputs.
pub fn render_word_email(word: &WordRow, recipient_name: &str) -> (String, String) {
    let word_date = format_publication_date(word.date_published);
    (
        render_html(word, recipient_name, &word_date),
        render_text(word, recipient_name, &word_date),
    )
}

fn render_html(word: &WordRow, recipient_name: &str, word_date: &str) -> String {
    let term = escape_html(&word.term);
    let definition = escape_html(&word.definition);
    let name = escape_html(recipient_name);
    let difficulty = escape_html(&word.difficulty);

    let pronunciation = word
        .pronunciation
        .as_deref()
        .map(|p| {
            format!(
                "                <div class=\"word-pronunciation\">{}</div>\n",
                escape_html(p)
            )
        })
        .unwrap_or_default();
    let example = word
        .example
        .as_deref()
        .map(|e| {
            format!(
                "                <div class=\"word-example\">&quot;{}&quot;</div>\n",
                escape_html(e)
            )
        })
        .unwrap_or_default();
    let category_badge = word
        .category
        .as_deref()
        .map(|c| {
            format!(
                "                    <span class=\"badge category-badge\">{}</span>\n",
                escape_html(c)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AI Word Daily - {term}</title>
    <style>{EMAIL_STYLES}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>🤖 AI Word Daily</h1>
            <p>{word_date}</p>
        </div>
        <div class="content">
            <p>Hello {name},</p>
            <p>Here's your word of the day to expand your vocabulary!</p>
            <div class="word-section">
                <div class="word-term">{term}</div>
{pronunciation}                <div class="word-definition">{definition}</div>
{example}                <div class="word-meta">
{category_badge}                    <span class="badge difficulty-{difficulty}">{difficulty}</span>
                </div>
            </div>
            <p>Keep learning and expanding your vocabulary! 🚀</p>
        </div>
        <div class="footer">
            <p>You're receiving this because you signed up for AI Word Daily.</p>
        </div>
    </div>
</body>
</html>
"#
    )
}

fn render_text(word: &WordRow, recipient_name: &str, word_date: &str) -> String {
    let mut body = format!(
        "AI Word Daily - {word_date}\n\nHello {recipient_name},\n\nHere's your word of the day:\n\n{}\n",
        word.term.to_uppercase()
    );
    if let Some(pronunciation) = &word.pronunciation {
        body.push_str(pronunciation);
        body.push('\n');
    }
    body.push_str(&format!("\nDefinition: {}\n", word.definition));
    if let Some(example) = &word.example {
        body.push_str(&format!("\nExample: \"{example}\"\n"));
    }
    body.push('\n');
    if let Some(category) = &word.category {
        body.push_str(&format!("Category: {category}\n"));
    }
    body.push_str(&format!("Difficulty: {}\n", title_case(&word.difficulty)));
    body.push_str(
        "\nKeep learning and expanding your vocabulary!\n\n---\nYou're receiving this because you signed up for AI Word Daily.\n",
    );
    body
}

/// Long human-readable date, falling back to "Today" when unset.
pub fn format_publication_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => date.format("%A, %B %d, %Y").to_string(),
        None => "Today".to_string(),
    }
}

pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bare_word() -> WordRow {
        WordRow {
            id: 1,
            term: "serendipity".to_string(),
            pronunciation: None,
            definition: "finding something good without looking for it".to_string(),
            example: None,
            category: None,
            difficulty: "beginner".to_string(),
            date_published: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn full_word() -> WordRow {
        WordRow {
            pronunciation: Some("/ˌserənˈdipədē/".to_string()),
            example: Some("Finding that book was pure serendipity.".to_string()),
            category: Some("general".to_string()),
            difficulty: "advanced".to_string(),
            date_published: NaiveDate::from_ymd_opt(2025, 8, 30),
            ..bare_word()
        }
    }

    #[test]
    fn renders_without_optional_fields() {
        let word = bare_word();
        let (html, text) = render_word_email(&word, "Ada");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("serendipity"));
        assert!(html.contains("Today"));
        assert!(html.contains("Hello Ada"));
        assert!(!html.contains("<div class=\"word-pronunciation\">"));
        assert!(!html.contains("<div class=\"word-example\">"));
        assert!(!html.contains("badge category-badge"));

        assert!(text.contains("SERENDIPITY"));
        assert!(text.contains("Today"));
        assert!(!text.contains("Example:"));
        assert!(!text.contains("Category:"));
        assert!(text.contains("Difficulty: Beginner"));
    }

    #[test]
    fn renders_all_fields_with_long_date() {
        let word = full_word();
        let (html, text) = render_word_email(&word, "Grace");

        assert!(html.contains("Saturday, August 30, 2025"));
        assert!(html.contains("<div class=\"word-pronunciation\">"));
        assert!(html.contains("Finding that book was pure serendipity."));
        assert!(html.contains("badge category-badge"));
        assert!(html.contains("badge difficulty-advanced"));

        assert!(text.contains("Saturday, August 30, 2025"));
        assert!(text.contains("Category: general"));
        assert!(text.contains("Difficulty: Advanced"));
    }

    #[test]
    fn html_escapes_user_content() {
        let mut word = bare_word();
        word.definition = "a <script>alert('x')</script> trick".to_string();
        let (html, _) = render_word_email(&word, "O'Brien & co");

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("O&#39;Brien &amp; co"));
    }

    #[test]
    fn title_cases_multi_word_terms() {
        assert_eq!(title_case("machine learning"), "Machine Learning");
        assert_eq!(title_case("ETHOS"), "Ethos");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn date_formatting_falls_back_to_today() {
        assert_eq!(format_publication_date(None), "Today");
        assert_eq!(
            format_publication_date(NaiveDate::from_ymd_opt(2025, 1, 6)),
            "Monday, January 06, 2025"
        );
    }
}
