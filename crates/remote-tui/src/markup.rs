//! Selection info arrives as an HTML fragment.  Flatten it to text lines for
//! the terminal: block elements and `<br>` start new lines, whitespace runs
//! collapse to one space.

use scraper::{ElementRef, Html};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "table", "tr",
];

#[derive(Default)]
struct Lines {
    done: Vec<String>,
    current: String,
}

impl Lines {
    fn push_text(&mut self, text: &str) {
        for (i, word) in text.split_whitespace().enumerate() {
            let starts_with_space = i > 0 || text.starts_with(char::is_whitespace);
            if starts_with_space && !self.current.is_empty() && !self.current.ends_with(' ') {
                self.current.push(' ');
            }
            self.current.push_str(word);
        }
        if text.ends_with(char::is_whitespace) && !self.current.is_empty() {
            self.current.push(' ');
        }
    }

    fn break_line(&mut self) {
        let line = self.current.trim().to_string();
        self.current.clear();
        if !line.is_empty() {
            self.done.push(line);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.break_line();
        self.done
    }
}

fn walk(element: ElementRef<'_>, out: &mut Lines) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_text(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if name == "br" {
                out.break_line();
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.break_line();
            }
            walk(el, out);
            if block {
                out.break_line();
            }
        }
    }
}

/// Text lines of an HTML fragment.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut lines = Lines::default();
    walk(fragment.root_element(), &mut lines);
    lines.finish()
}
