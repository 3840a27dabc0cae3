//! Identifier safety, quoting and the shared reserved-word list.

/// Words reserved by standard SQL. Dialects add or remove words on top of this.
pub const SQL_RESERVED_WORDS: &[&str] = &[
    "absolute", "action", "add", "all", "allocate", "alter", "and", "any", "are", "as", "asc",
    "assertion", "at", "authorization", "avg", "begin", "between", "bit", "bit_length", "both",
    "by", "call", "cascade", "cascaded", "case", "cast", "catalog", "char", "char_length",
    "character", "character_length", "check", "close", "coalesce", "collate", "collation",
    "column", "commit", "condition", "connect", "connection", "constraint", "constraints",
    "continue", "convert", "corresponding", "count", "create", "cross", "current",
    "current_date", "current_path", "current_time", "current_timestamp", "current_user",
    "cursor", "day", "deallocate", "dec", "decimal", "declare", "default", "deferrable",
    "deferred", "delete", "desc", "describe", "descriptor", "deterministic", "diagnostics",
    "disconnect", "distinct", "do", "domain", "double", "drop", "else", "elseif", "end",
    "escape", "except", "exception", "exec", "execute", "exists", "exit", "external", "extract",
    "false", "fetch", "first", "float", "for", "foreign", "found", "from", "full", "function",
    "get", "global", "go", "goto", "grant", "group", "handler", "having", "hour", "identity",
    "if", "immediate", "in", "indicator", "initially", "inner", "inout", "input", "insensitive",
    "insert", "int", "integer", "intersect", "interval", "into", "is", "isolation", "join",
    "key", "language", "last", "leading", "leave", "left", "level", "like", "local", "loop",
    "lower", "match", "max", "min", "minute", "module", "month", "names", "national", "natural",
    "nchar", "next", "no", "not", "null", "nullif", "numeric", "octet_length", "of", "on",
    "only", "open", "option", "or", "order", "out", "outer", "output", "overlaps", "pad",
    "parameter", "partial", "path", "position", "precision", "prepare", "preserve", "primary",
    "prior", "privileges", "procedure", "public", "read", "real", "references", "relative",
    "repeat", "resignal", "restrict", "return", "returns", "revoke", "right", "rollback",
    "routine", "rows", "schema", "scroll", "second", "section", "select", "session",
    "session_user", "set", "signal", "size", "smallint", "some", "space", "specific", "sql",
    "sqlcode", "sqlerror", "sqlexception", "sqlstate", "sqlwarning", "substring", "sum",
    "system_user", "table", "temporary", "then", "time", "timestamp", "timezone_hour",
    "timezone_minute", "to", "trailing", "transaction", "translate", "translation", "trim",
    "true", "undo", "union", "unique", "unknown", "until", "update", "upper", "usage", "user",
    "using", "value", "values", "varchar", "varying", "view", "when", "whenever", "where",
    "while", "with", "work", "write", "year", "zone",
];

/// True when `token` can be emitted without quoting, reserved words aside:
/// it starts with an ASCII letter and continues with letters, digits or `_`.
pub fn is_safe_token(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Wrap `name` in `quote`, doubling any embedded quote characters.
pub fn quote_identifier(name: &str, quote: char) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Reverse [`quote_identifier`]. Unquoted input is returned unchanged.
pub fn unquote_identifier(text: &str, quote: char) -> String {
    let q = quote.len_utf8();
    if text.len() >= 2 * q && text.starts_with(quote) && text.ends_with(quote) {
        let doubled: String = [quote, quote].iter().collect();
        text[q..text.len() - q].replace(&doubled, &quote.to_string())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_safe_tokens() {
        assert!(is_safe_token("title"));
        assert!(is_safe_token("Title_30"));
        assert!(!is_safe_token("_1"));
        assert!(!is_safe_token("with space"));
        assert!(!is_safe_token("1abc"));
        assert!(!is_safe_token(""));
    }

    #[test]
    fn test_quote_round_trip() {
        for name in ["with space", "with`\"escape", "SELECT", "\"", "``", ""] {
            for quote in ['"', '`'] {
                let quoted = quote_identifier(name, quote);
                assert_eq!(unquote_identifier(&quoted, quote), name);
            }
        }
        assert_eq!(quote_identifier("with`\"escape", '`'), "`with``\"escape`");
        assert_eq!(quote_identifier("with`\"escape", '"'), "\"with`\"\"escape\"");
    }

    #[test]
    fn test_reserved_words_are_lowercase() {
        assert!(SQL_RESERVED_WORDS
            .iter()
            .all(|w| w.chars().all(|c| !c.is_ascii_uppercase())));
    }
}
