use std::collections::HashMap;

use factgraph_core::FactGraphError;

use crate::types::{
    AggFn, AggregateSpec, Filter, FilterOp, Group, OrderKey, Query, SortDirection, Term,
    TriplePatternAst, UnionBranch,
};

/// Prefixes that expand to their own IRI verbatim even without an explicit
/// `PREFIX prov: <...>` declaration, since they're already known vocabulary.
const KNOWN_PROV_PREFIXES: &[&str] = &["prov", "rdf", "rdfs", "xsd"];

const FORBIDDEN_KEYWORDS: &[&str] = &["INSERT", "DELETE", "DROP", "LOAD", "CLEAR"];

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Variable(String),
    StringLit(String),
    Number(String),
    Punct(char),
    Eof,
}

struct PositionedToken {
    token: Token,
    pos: usize,
}

struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    _src: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            _src: src,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn tokenize(mut self) -> Result<Vec<PositionedToken>, FactGraphError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek_char() else {
                tokens.push(PositionedToken { token: Token::Eof, pos: start });
                break;
            };
            let token = match c {
                '{' | '}' | '(' | ')' | ',' | '.' => {
                    self.pos += 1;
                    Token::Punct(c)
                }
                '?' | '$' => {
                    self.pos += 1;
                    Token::Variable(self.read_while(is_name_char))
                }
                '<' => {
                    self.pos += 1;
                    let iri = self.read_until('>');
                    if self.peek_char() == Some('>') {
                        self.pos += 1;
                    }
                    Token::Ident(format!("<{iri}>"))
                }
                '"' | '\'' => {
                    let quote = c;
                    self.pos += 1;
                    Token::StringLit(self.read_string(quote))
                }
                '=' | '!' | '<' | '>' => {
                    self.pos += 1;
                    let mut op = c.to_string();
                    if self.peek_char() == Some('=') {
                        op.push('=');
                        self.pos += 1;
                    }
                    Token::Ident(op)
                }
                c if c.is_ascii_digit() || (c == '-' && self.chars.get(self.pos + 1).is_some_and(|n| n.is_ascii_digit())) => {
                    Token::Number(self.read_number())
                }
                c if is_name_start(c) => Token::Ident(self.read_while(is_name_char)),
                other => {
                    return Err(FactGraphError::ParseError(format!(
                        "unexpected character '{other}' at position {start}"
                    )))
                }
            };
            tokens.push(PositionedToken { token, pos: start });
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_while(&mut self, pred: fn(char) -> bool) -> String {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.peek_char() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_until(&mut self, stop: char) -> String {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if c != stop) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_string(&mut self, quote: char) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.pos += 1;
                if let Some(escaped) = self.peek_char() {
                    out.push(escaped);
                    self.pos += 1;
                }
                continue;
            }
            if c == quote {
                self.pos += 1;
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':' || c == '-'
}

pub struct Parser {
    tokens: Vec<PositionedToken>,
    idx: usize,
    prefixes: HashMap<String, String>,
}

impl Parser {
    /// Parse `text` into a [`Query`] logical plan.
    pub fn parse(text: &str) -> Result<Query, FactGraphError> {
        reject_forbidden_keywords(text)?;

        let tokens = Tokenizer::new(text).tokenize()?;
        let mut parser = Parser { tokens, idx: 0, prefixes: HashMap::new() };
        parser.parse_query()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.idx].token
    }

    fn pos(&self) -> usize {
        self.tokens[self.idx].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.idx].token.clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    fn expect_ident(&mut self, expected_lower: &str) -> Result<(), FactGraphError> {
        match self.advance() {
            Token::Ident(s) if s.eq_ignore_ascii_case(expected_lower) => Ok(()),
            other => Err(self.err_at(format!("expected '{expected_lower}', found {other:?}"))),
        }
    }

    fn peek_ident_is(&self, expected_lower: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(expected_lower))
    }

    fn err_at(&self, message: String) -> FactGraphError {
        FactGraphError::ParseError(format!("{message} at position {}", self.pos()))
    }

    fn parse_query(&mut self) -> Result<Query, FactGraphError> {
        let mut query = Query::default();

        while self.peek_ident_is("PREFIX") || self.peek_ident_is("BASE") {
            self.parse_prologue_decl(&mut query)?;
        }
        query.prefixes = self.prefixes.clone();

        match self.advance() {
            Token::Ident(s) if s.eq_ignore_ascii_case("SELECT") => {}
            Token::Ident(s)
                if s.eq_ignore_ascii_case("CONSTRUCT")
                    || s.eq_ignore_ascii_case("ASK")
                    || s.eq_ignore_ascii_case("DESCRIBE") =>
            {
                return Err(FactGraphError::ParseError(format!("unsupported query type: {s}")));
            }
            other => return Err(self.err_at(format!("expected SELECT, found {other:?}"))),
        }

        self.parse_select_list(&mut query)?;
        self.expect_ident("WHERE")?;
        let mut unions = Vec::new();
        let root = self.parse_group(&mut unions)?;
        query.patterns = root.patterns;
        query.filters = root.filters;
        query.optionals = root.optionals;
        query.unions = unions;
        for pattern in &query.patterns {
            record_variable_position(&mut query.variable_positions, &pattern.subject, "s");
            record_variable_position(&mut query.variable_positions, &pattern.predicate, "p");
            record_variable_position(&mut query.variable_positions, &pattern.object, "o");
        }

        if self.peek_ident_is("GROUP") {
            self.advance();
            self.expect_ident("BY")?;
            while let Token::Variable(v) = self.peek().clone() {
                query.group_by.push(v);
                self.advance();
            }
        }

        if self.peek_ident_is("ORDER") {
            self.advance();
            self.expect_ident("BY")?;
            loop {
                let direction = if self.peek_ident_is("DESC") {
                    self.advance();
                    SortDirection::Desc
                } else if self.peek_ident_is("ASC") {
                    self.advance();
                    SortDirection::Asc
                } else {
                    SortDirection::Asc
                };
                let Token::Variable(v) = self.advance() else {
                    return Err(self.err_at("expected variable in ORDER BY".to_string()));
                };
                query.order_by.push(OrderKey { variable: v, direction });
                if !matches!(self.peek(), Token::Variable(_)) && !self.peek_ident_is("ASC") && !self.peek_ident_is("DESC") {
                    break;
                }
            }
        }

        if self.peek_ident_is("LIMIT") {
            self.advance();
            query.limit = Some(self.parse_usize()?);
        }
        if self.peek_ident_is("OFFSET") {
            self.advance();
            query.offset = Some(self.parse_usize()?);
        }

        query.has_aggregates = !query.aggregates.is_empty();
        Ok(query)
    }

    fn parse_usize(&mut self) -> Result<usize, FactGraphError> {
        match self.advance() {
            Token::Number(n) => n.parse().map_err(|_| self.err_at(format!("invalid integer '{n}'"))),
            other => Err(self.err_at(format!("expected integer, found {other:?}"))),
        }
    }

    fn parse_prologue_decl(&mut self, query: &mut Query) -> Result<(), FactGraphError> {
        let keyword = self.advance();
        let is_prefix = matches!(&keyword, Token::Ident(s) if s.eq_ignore_ascii_case("PREFIX"));
        if is_prefix {
            let Token::Ident(name) = self.advance() else {
                return Err(self.err_at("expected prefix name".to_string()));
            };
            let name = name.trim_end_matches(':').to_string();
            let Token::Ident(iri) = self.advance() else {
                return Err(self.err_at("expected prefix IRI".to_string()));
            };
            self.prefixes.insert(name, iri.trim_matches(|c| c == '<' || c == '>').to_string());
        } else {
            // BASE <iri>
            self.advance();
        }
        let _ = query;
        Ok(())
    }

    fn parse_select_list(&mut self, query: &mut Query) -> Result<(), FactGraphError> {
        loop {
            match self.peek().clone() {
                Token::Variable(v) => {
                    query.variables.push(v);
                    self.advance();
                }
                Token::Ident(s) if is_agg_fn(&s) => {
                    let agg = self.parse_aggregate(&s)?;
                    query.variables.push(agg.alias.clone());
                    query.aggregates.push(agg);
                }
                // `(COUNT(...) AS ?alias)` — the outer parens around an
                // aggregate projection.
                Token::Punct('(') => {
                    self.advance();
                    let Token::Ident(fn_name) = self.peek().clone() else {
                        return Err(self.err_at("expected aggregate function after '('".to_string()));
                    };
                    if !is_agg_fn(&fn_name) {
                        return Err(self.err_at(format!("'{fn_name}' is not a recognised aggregate function")));
                    }
                    let agg = self.parse_aggregate(&fn_name)?;
                    if !matches!(self.advance(), Token::Punct(')')) {
                        return Err(self.err_at("expected ')' closing projected aggregate".to_string()));
                    }
                    query.variables.push(agg.alias.clone());
                    query.aggregates.push(agg);
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("WHERE") => break,
                _ => break,
            }
        }
        Ok(())
    }

    fn parse_aggregate(&mut self, fn_name: &str) -> Result<AggregateSpec, FactGraphError> {
        let func = agg_fn_from_name(fn_name).expect("checked by is_agg_fn");
        self.advance(); // consume function name
        if !matches!(self.advance(), Token::Punct('(')) {
            return Err(self.err_at("expected '(' after aggregate function".to_string()));
        }

        let distinct = if self.peek_ident_is("DISTINCT") {
            self.advance();
            true
        } else {
            false
        };

        let Token::Variable(variable) = self.advance() else {
            return Err(self.err_at("expected variable inside aggregate".to_string()));
        };

        let separator = if func == AggFn::GroupConcat && self.peek_ident_is("SEPARATOR") {
            self.advance();
            match self.advance() {
                Token::StringLit(s) => Some(s),
                other => return Err(self.err_at(format!("expected string after SEPARATOR, found {other:?}"))),
            }
        } else {
            None
        };

        if !matches!(self.advance(), Token::Punct(')')) {
            return Err(self.err_at("expected ')' closing aggregate".to_string()));
        }

        let default_alias = format!("{}_{}", func.name_lower(), variable);
        let alias = if self.peek_ident_is("AS") {
            self.advance();
            match self.advance() {
                Token::Variable(v) => v,
                other => return Err(self.err_at(format!("expected alias variable after AS, found {other:?}"))),
            }
        } else {
            default_alias
        };

        Ok(AggregateSpec { func, variable, distinct, alias, separator })
    }

    /// Parse a `{ ... }` group, collecting any `{ } UNION { }` branches
    /// encountered (at any nesting depth) into `unions` rather than leaving
    /// them attached to the enclosing group — the executor evaluates
    /// `query.unions` as independent sub-BGPs.
    fn parse_group(&mut self, unions: &mut Vec<UnionBranch>) -> Result<Group, FactGraphError> {
        if !matches!(self.advance(), Token::Punct('{')) {
            return Err(self.err_at("expected '{'".to_string()));
        }

        let mut group = Group::default();
        loop {
            match self.peek().clone() {
                Token::Punct('}') => {
                    self.advance();
                    break;
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("FILTER") => {
                    self.advance();
                    group.filters.push(self.parse_filter()?);
                }
                Token::Ident(s) if s.eq_ignore_ascii_case("OPTIONAL") => {
                    self.advance();
                    group.optionals.push(self.parse_group(unions)?);
                }
                Token::Punct('{') => {
                    let left = self.parse_group(unions)?;
                    if self.peek_ident_is("UNION") {
                        self.advance();
                        let right = self.parse_group(unions)?;
                        unions.push(UnionBranch { left, right });
                    } else {
                        group.patterns.extend(left.patterns);
                        group.filters.extend(left.filters);
                        group.optionals.extend(left.optionals);
                    }
                }
                Token::Eof => return Err(self.err_at("unterminated group".to_string())),
                _ => {
                    group.patterns.push(self.parse_triple_pattern()?);
                    if matches!(self.peek(), Token::Punct('.')) {
                        self.advance();
                    }
                }
            }
        }
        Ok(group)
    }

    fn parse_triple_pattern(&mut self) -> Result<TriplePatternAst, FactGraphError> {
        let subject = self.parse_term()?;
        let predicate = self.parse_term()?;
        let object = self.parse_term()?;
        Ok(TriplePatternAst { subject, predicate, object })
    }

    fn parse_term(&mut self) -> Result<Term, FactGraphError> {
        match self.advance() {
            Token::Variable(v) => Ok(Term::Variable(v)),
            Token::StringLit(s) => Ok(Term::Literal(s)),
            Token::Number(n) => Ok(Term::Literal(n)),
            Token::Ident(s) if s.starts_with('<') => Ok(Term::Iri(s.trim_matches(|c| c == '<' || c == '>').to_string())),
            Token::Ident(s) => Ok(Term::Iri(self.expand_prefixed(&s))),
            other => Err(self.err_at(format!("expected term, found {other:?}"))),
        }
    }

    fn expand_prefixed(&self, name: &str) -> String {
        if let Some((prefix, local)) = name.split_once(':') {
            if let Some(iri) = self.prefixes.get(prefix) {
                return format!("{iri}{local}");
            }
            if KNOWN_PROV_PREFIXES.contains(&prefix) {
                return name.to_string();
            }
        }
        name.to_string()
    }

    fn parse_filter(&mut self) -> Result<Filter, FactGraphError> {
        if !matches!(self.advance(), Token::Punct('(')) {
            return Err(self.err_at("expected '(' after FILTER".to_string()));
        }

        if self.peek_ident_is("regex") {
            self.advance();
            if !matches!(self.advance(), Token::Punct('(')) {
                return Err(self.err_at("expected '(' after regex".to_string()));
            }
            let Token::Variable(variable) = self.advance() else {
                return Err(self.err_at("expected variable in regex(...)".to_string()));
            };
            if !matches!(self.advance(), Token::Punct(',')) {
                return Err(self.err_at("expected ',' in regex(...)".to_string()));
            }
            let Token::StringLit(pattern) = self.advance() else {
                return Err(self.err_at("expected string pattern in regex(...)".to_string()));
            };
            if !matches!(self.advance(), Token::Punct(')')) {
                return Err(self.err_at("expected ')' closing regex(...)".to_string()));
            }
            if !matches!(self.advance(), Token::Punct(')')) {
                return Err(self.err_at("expected ')' closing FILTER(...)".to_string()));
            }
            return Ok(Filter { variable, op: FilterOp::Regex, value: pattern });
        }

        let Token::Variable(variable) = self.advance() else {
            return Err(self.err_at("expected variable in FILTER(...)".to_string()));
        };
        let op = match self.advance() {
            Token::Ident(s) => match s.as_str() {
                "=" => FilterOp::Eq,
                "!=" => FilterOp::Ne,
                "<" => FilterOp::Lt,
                ">" => FilterOp::Gt,
                "<=" => FilterOp::Le,
                ">=" => FilterOp::Ge,
                other => return Err(self.err_at(format!("unsupported filter operator '{other}'"))),
            },
            other => return Err(self.err_at(format!("expected operator, found {other:?}"))),
        };
        let value = match self.advance() {
            Token::StringLit(s) => s,
            Token::Number(n) => n,
            Token::Variable(v) => v,
            other => return Err(self.err_at(format!("expected filter value, found {other:?}"))),
        };
        if !matches!(self.advance(), Token::Punct(')')) {
            return Err(self.err_at("expected ')' closing FILTER(...)".to_string()));
        }
        Ok(Filter { variable, op, value })
    }
}

/// Record which triple position a root-level pattern variable came from, so
/// the executor's final projection can fall back to the raw `s`/`p`/`o`
/// binding when a selected variable has no row-level value of its own.
fn record_variable_position(positions: &mut HashMap<String, String>, term: &Term, position: &str) {
    if let Term::Variable(name) = term {
        positions.entry(name.clone()).or_insert_with(|| position.to_string());
    }
}

fn is_agg_fn(s: &str) -> bool {
    agg_fn_from_name(s).is_some()
}

fn agg_fn_from_name(s: &str) -> Option<AggFn> {
    match s.to_ascii_uppercase().as_str() {
        "COUNT" => Some(AggFn::Count),
        "SUM" => Some(AggFn::Sum),
        "AVG" => Some(AggFn::Avg),
        "MIN" => Some(AggFn::Min),
        "MAX" => Some(AggFn::Max),
        "GROUP_CONCAT" => Some(AggFn::GroupConcat),
        _ => None,
    }
}

fn reject_forbidden_keywords(text: &str) -> Result<(), FactGraphError> {
    let upper = text.to_ascii_uppercase();
    for word in FORBIDDEN_KEYWORDS {
        if contains_word(&upper, word) {
            return Err(FactGraphError::SecurityViolation(format!(
                "mutating keyword '{word}' is not permitted"
            )));
        }
    }
    Ok(())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let wbytes = word.as_bytes();
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(word) {
        let idx = start + rel;
        let before_ok = idx == 0 || !bytes[idx - 1].is_ascii_alphanumeric();
        let after_idx = idx + wbytes.len();
        let after_ok = after_idx >= bytes.len() || !bytes[after_idx].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = idx + 1;
    }
    false
}
