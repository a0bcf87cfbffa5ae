//! Token cursor over an argument vector.
//!
//! Every parser in this crate consumes tokens through a [`Cursor`]. The
//! cursor remembers the set of values it was last asked for, so that a
//! failure anywhere in the grammar can report what was consumed, what was
//! left, and what would have been accepted.
//!
//! # Example
//!
//! ```
//! use ipcmd::cursor::Cursor;
//!
//! let mut c = Cursor::new(["link", "show", "eth0"]);
//! assert_eq!(c.find_prefix(&["link", "route"]).as_deref(), Some("link"));
//! assert_eq!(c.next_token(&["show"]).unwrap(), "show");
//! assert!(c.tokens_remain());
//! ```

use crate::error::{Error, Result, token_list};

/// A movable position over the arguments of one command.
///
/// Position -1 means nothing has been consumed yet.
#[derive(Debug, Clone)]
pub struct Cursor {
    args: Vec<String>,
    pos: isize,
    expected: Vec<String>,
}

impl Cursor {
    /// Create a cursor positioned before the first token.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            pos: -1,
            expected: Vec::new(),
        }
    }

    /// All arguments, consumed or not.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The current position.
    pub fn position(&self) -> isize {
        self.pos
    }

    /// The last recorded expected-value set.
    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    fn expect(&mut self, expected: &[&str]) {
        if !expected.is_empty() {
            self.expected = expected.iter().map(|s| (*s).to_string()).collect();
        }
    }

    fn at(&self, pos: isize) -> Option<&str> {
        usize::try_from(pos)
            .ok()
            .and_then(|p| self.args.get(p))
            .map(String::as_str)
    }

    /// Advance and return the token at the new position.
    pub fn next_token(&mut self, expected: &[&str]) -> Result<String> {
        self.expect(expected);
        self.pos += 1;
        match self.at(self.pos) {
            Some(tok) => Ok(tok.to_string()),
            None => Err(self.out_of_tokens()),
        }
    }

    /// Return the token at the current position.
    pub fn current_token(&self) -> Option<&str> {
        self.at(self.pos)
    }

    /// Return the token after the current position without consuming it.
    pub fn peek_token(&mut self, expected: &[&str]) -> Option<&str> {
        self.expect(expected);
        self.at(self.pos + 1)
    }

    /// Step back one token, returning the token now under the cursor.
    pub fn last_token(&mut self, expected: &[&str]) -> Option<&str> {
        self.expect(expected);
        if self.pos >= 0 {
            self.pos -= 1;
        }
        self.at(self.pos)
    }

    /// Whether at least one more token can be consumed.
    pub fn tokens_remain(&self) -> bool {
        self.pos < self.args.len() as isize - 1
    }

    /// Consume the next token and resolve it against `candidates`.
    ///
    /// An exact match wins. Otherwise exactly one candidate must start
    /// with the token. Ambiguous, empty and missing tokens yield `None`.
    pub fn find_prefix(&mut self, candidates: &[&str]) -> Option<String> {
        let token = self.next_token(candidates).ok()?;
        find_prefix(&token, candidates).map(str::to_string)
    }

    /// Build the usage diagnostic for the current position.
    pub fn usage(&self) -> Error {
        let len = self.args.len();
        let pos = self.pos.clamp(0, len as isize) as usize;
        Error::Usage {
            fine: token_list(&self.args[..pos]),
            left: token_list(&self.args[pos..]),
            bad: self.args.get(pos).cloned().unwrap_or_default(),
            options: token_list(&self.expected),
        }
    }

    /// Build the out-of-tokens diagnostic for the current position.
    pub fn out_of_tokens(&self) -> Error {
        Error::OutOfTokens {
            args: token_list(&self.args),
            pos: self.pos,
            expected: token_list(&self.expected),
        }
    }
}

/// Resolve `token` to one of `candidates` by exact or unique prefix match.
///
/// An exact match is taken even when it also prefixes other candidates,
/// so `del` resolves against `del`/`delete` and `delete` against
/// `delete`/`deleteall`.
pub fn find_prefix<'a>(token: &str, candidates: &[&'a str]) -> Option<&'a str> {
    if token.is_empty() {
        return None;
    }
    if let Some(exact) = candidates.iter().find(|c| **c == token) {
        return Some(exact);
    }
    let mut matches = candidates.iter().filter(|c| c.starts_with(token));
    match (matches.next(), matches.next()) {
        (Some(one), None) => Some(one),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(pos: isize, args: &[&str]) -> Cursor {
        let mut c = Cursor::new(args.iter().copied());
        c.pos = pos;
        c
    }

    #[test]
    fn test_tokens_remain() {
        let mut c = at(0, &["arg1", "arg2", "arg3"]);
        assert!(c.tokens_remain());
        c.pos = 2;
        assert!(!c.tokens_remain());
        assert!(Cursor::new(["x"]).tokens_remain());
        assert!(!Cursor::new(Vec::<String>::new()).tokens_remain());
    }

    #[test]
    fn test_next_token_records_expected() {
        let mut c = at(0, &["arg1", "arg2", "arg3"]);
        assert_eq!(c.current_token(), Some("arg1"));
        assert_eq!(c.next_token(&[]).unwrap(), "arg2");
        c.next_token(&["val1", "val2"]).unwrap();
        assert_eq!(c.expected(), ["val1", "val2"]);
    }

    #[test]
    fn test_next_token_out_of_range() {
        let mut c = Cursor::new(["addr", "add"]);
        c.next_token(&[]).unwrap();
        c.next_token(&[]).unwrap();
        let err = c.next_token(&["CIDR format address"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "args: [addr add], I got to arg 2, expected [CIDR format address] after that"
        );
    }

    #[test]
    fn test_last_token() {
        let mut c = at(2, &["arg1", "arg2", "arg3"]);
        assert_eq!(c.last_token(&["val1", "val2"]), Some("arg2"));
        assert_eq!(c.expected().len(), 2);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut c = at(0, &["mark", "5", "mask"]);
        assert_eq!(c.peek_token(&["mask"]), Some("5"));
        assert_eq!(c.position(), 0);
        c.pos = 2;
        assert_eq!(c.peek_token(&[]), None);
    }

    #[test]
    fn test_find_prefix() {
        let cases: &[(&[&str], isize, &[&str], Option<&str>)] = &[
            (&["cmd", "option1", "value1"], 0, &["opt", "option2"], None),
            (&["cmd", "option1", "value1"], 0, &["opt", "option1"], Some("option1")),
            (&["cmd", "option", "value1"], 0, &["option1", "option2"], None),
            (&["cmd", "option1", "value1"], 1, &["value1", "value2"], Some("value1")),
        ];
        for (args, pos, cands, want) in cases {
            let mut c = at(*pos, args);
            assert_eq!(c.find_prefix(cands).as_deref(), *want, "{args:?}");
        }
    }

    #[test]
    fn test_find_prefix_ambiguous() {
        assert_eq!(find_prefix("s", &["show", "set"]), None);
        assert_eq!(find_prefix("sh", &["show", "delete"]), Some("show"));
        assert_eq!(find_prefix("", &["show"]), None);
        // exact match beats a longer candidate
        assert_eq!(find_prefix("tuntap", &["tuntap", "tuntapx"]), Some("tuntap"));
        assert_eq!(find_prefix("del", &["delete", "del"]), Some("del"));
        assert_eq!(find_prefix("delete", &["deleteall", "delete"]), Some("delete"));
        assert_eq!(find_prefix("dele", &["deleteall", "delete"]), None);
    }

    #[test]
    fn test_find_prefix_past_end() {
        let mut c = Cursor::new(["link"]);
        c.next_token(&[]).unwrap();
        assert_eq!(c.find_prefix(&["show"]), None);
    }

    #[test]
    fn test_usage_message() {
        let mut c = Cursor::new(["link", "frob"]);
        c.next_token(&[]).unwrap();
        c.next_token(&["show", "set"]).unwrap();
        assert_eq!(
            c.usage().to_string(),
            "this was fine: '[link]', and this was left, '[frob]', and this was not understood, 'frob'; only options are '[show set]'"
        );
    }

    #[test]
    fn test_usage_past_end() {
        let mut c = Cursor::new(["tcpmetrics"]);
        c.next_token(&[]).unwrap();
        let _ = c.next_token(&["help"]);
        assert_eq!(
            c.usage().to_string(),
            "this was fine: '[tcpmetrics]', and this was left, '[]', and this was not understood, ''; only options are '[help]'"
        );
    }
}
