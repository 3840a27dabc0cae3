//! Placeholder accounting and rewriting.
//!
//! Compilers always emit `?`. Before text reaches a backend the marks are
//! counted (to catch parameter mismatches) and rewritten to the backend's own
//! style. Marks inside quoted strings and quoted identifiers are left alone.

/// How a backend spells parameter placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMark {
    /// `?` (SQLite, MySQL)
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

/// Walk `sql`, calling `on_mark` for every `?` outside quotes.
fn scan(sql: &str, mut on_mark: impl FnMut(&mut String, usize), out: &mut String) -> usize {
    let mut quote: Option<char> = None;
    let mut count = 0;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => {
                // A doubled quote closes and reopens; the state ends up unchanged.
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    count += 1;
                    on_mark(out, count);
                }
                _ => out.push(c),
            },
        }
    }
    count
}

/// Number of placeholders outside quoted regions.
pub fn count_marks(sql: &str) -> usize {
    let mut sink = String::new();
    scan(sql, |_, _| {}, &mut sink)
}

/// Rewrite `?` placeholders into `mark` style.
pub fn convert_marks(sql: &str, mark: ParamMark) -> String {
    match mark {
        ParamMark::Question => sql.to_string(),
        ParamMark::Numbered => {
            let mut out = String::with_capacity(sql.len() + 8);
            scan(sql, |out, n| out.push_str(&format!("${n}")), &mut out);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_count_ignores_quoted_marks() {
        assert_eq!(count_marks("SELECT ?, '?', \"a?\", `b?`"), 1);
        assert_eq!(count_marks("SELECT 'it''s ?' WHERE x = ?"), 1);
        assert_eq!(count_marks("SELECT \"with`\"\"escape\" FROM t WHERE a = ? AND b = ?"), 2);
    }

    #[test]
    fn test_numbered_marks() {
        assert_eq!(
            convert_marks("SELECT ? FROM t WHERE a = '?' AND b = ?", ParamMark::Numbered),
            "SELECT $1 FROM t WHERE a = '?' AND b = $2"
        );
        assert_eq!(
            convert_marks("SELECT ?", ParamMark::Question),
            "SELECT ?"
        );
    }
}
