//! HTML pages for the upload form and the prediction result.

use axum::response::Html;

use crate::model::Prediction;

const TITLE: &str = "Hand Sign Digit Language Detection";
const TAGLINE: &str = "A webapp to detect a digit using hand sign language.";

/// What the result page reports.
#[derive(Debug, Clone)]
pub enum Outcome {
    Predicted(Prediction),
    Failed(String),
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no">
  <title>{TITLE}</title>
  <link rel="stylesheet" href="https://stackpath.bootstrapcdn.com/bootstrap/4.1.3/css/bootstrap.min.css">
  <link rel="stylesheet" href="/static/css/custom.css">
</head>
<body>
  <nav class="navbar navbar-dark bg-dark">
    <a class="navbar-brand" href="/">{TITLE}</a>
  </nav>
  <main class="container">
{body}
  </main>
  <script src="https://code.jquery.com/jquery-3.3.1.slim.min.js"></script>
  <script src="https://cdnjs.cloudflare.com/ajax/libs/popper.js/1.14.3/umd/popper.min.js"></script>
  <script src="https://stackpath.bootstrapcdn.com/bootstrap/4.1.3/js/bootstrap.min.js"></script>
</body>
</html>
"#
    )
}

pub fn index_page() -> Html<String> {
    let body = format!(
        r#"    <div class="jumbotron">
      <h1>{TITLE}</h1>
      <p class="lead">{TAGLINE}</p>
    </div>
    <form action="/prediction" method="post" enctype="multipart/form-data">
      <div class="form-group">
        <input type="file" class="form-control-file" name="file" accept="image/*" required>
      </div>
      <button type="submit" class="btn btn-primary">Predict</button>
    </form>"#
    );
    Html(layout(&body))
}

pub fn result_page(outcome: &Outcome) -> Html<String> {
    let result = match outcome {
        Outcome::Predicted(prediction) => format!(
            r#"      <h2 class="prediction">Prediction: {}</h2>"#,
            escape(&prediction.to_string())
        ),
        Outcome::Failed(message) => format!(
            r#"      <h2>Prediction</h2>
      <div class="alert alert-danger" role="alert">{}</div>"#,
            escape(message)
        ),
    };

    let body = format!(
        r#"    <div class="jumbotron">
      <h1>{TITLE}</h1>
{result}
    </div>
    <a class="btn btn-secondary" href="/">Try another image</a>"#
    );
    Html(layout(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_has_form_and_assets() {
        let Html(page) = index_page();
        assert!(page.contains(TITLE));
        assert!(page.contains(TAGLINE));
        assert!(page.contains(r#"<form action="/prediction""#));
        assert!(page.contains(r#"name="file""#));
        assert!(page.contains("custom.css"));
        assert!(page.contains("bootstrap.min.js"));
        assert!(page.contains("jquery-3.3.1.slim.min.js"));
    }

    #[test]
    fn test_result_shows_prediction() {
        let Html(page) = result_page(&Outcome::Predicted(Prediction {
            class_index: 7,
            label: None,
            confidence: 0.8,
        }));
        assert!(page.contains("Prediction: 7"));
        assert!(page.contains(TITLE));
    }

    #[test]
    fn test_error_text_is_escaped() {
        let Html(page) = result_page(&Outcome::Failed("<script>x</script> & co".to_string()));
        assert!(page.contains("&lt;script&gt;x&lt;/script&gt; &amp; co"));
        assert!(!page.contains("<script>x</script>"));
    }
}
