//! OSC address pattern matching.
//!
//! Both sides of a match may contain wildcards: a receiver's registered
//! pattern is matched against an incoming address that can itself be a
//! pattern. Each string is compiled into a small automaton and two strings
//! match when some concrete address is accepted by both.
//!
//! Syntax:
//!
//! - `?` matches any single character
//! - `*` matches any run of characters, including none
//! - `[abc]`, `[a-z]` match one character from the set; `[!...]` negates it
//! - `{foo,bar}` matches any one of the literal alternatives
//!
//! None of the wildcards match `/`, so a wildcard never crosses a segment
//! boundary. A `[` or `{` without its closing bracket is plain text.

use std::collections::HashSet;
use std::fmt;

/// Characters which turn a string into a pattern.
const SPECIAL: &[char] = &['?', '*', '[', '{'];

/// Whether `a` and `b` match each other.
///
/// ```
/// assert!(dispatch::matches("/foo/bar", "/foo/*"));
/// assert!(dispatch::matches("/foo/*", "/foo/bar"));
/// assert!(!dispatch::matches("/foo/bar/baz", "/foo/*"));
/// ```
pub fn matches(a: &str, b: &str) -> bool {
    if is_literal(a) && is_literal(b) {
        return a == b;
    }
    Pattern::new(a).matches(&Pattern::new(b))
}

fn is_literal(s: &str) -> bool {
    !s.contains(SPECIAL)
}

/// A compiled address pattern.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    literal: bool,
    automaton: Automaton,
}

impl Pattern {
    /// Compile `source`. Every string is a valid pattern.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let literal = is_literal(&source);
        let automaton = Automaton::compile(&source);
        Self {
            source,
            literal,
            automaton,
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains no wildcards.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Whether some address is matched by both patterns.
    pub fn matches(&self, other: &Pattern) -> bool {
        if self.literal && other.literal {
            return self.source == other.source;
        }
        self.automaton.intersects(&other.automaton)
    }

    /// Whether the pattern matches `address`, which may itself be a pattern.
    pub fn matches_str(&self, address: &str) -> bool {
        if self.literal && is_literal(address) {
            return self.source == address;
        }
        self.automaton.intersects(&Automaton::compile(address))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// What a single transition consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Char(char),
    Any,
    Set { ranges: Vec<(char, char)>, negated: bool },
}

impl Label {
    fn accepts(&self, c: char) -> bool {
        match self {
            Label::Char(expected) => *expected == c,
            Label::Any => c != '/',
            Label::Set { ranges, negated } => {
                c != '/' && ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != *negated
            }
        }
    }

    /// Start points of the intervals this label accepts. Two labels overlap
    /// exactly when one of their combined start points is accepted by both.
    fn starts(&self, out: &mut Vec<u32>) {
        match self {
            Label::Char(c) => out.push(u32::from(*c)),
            Label::Any => out.push(0),
            Label::Set {
                ranges,
                negated: false,
            } => out.extend(ranges.iter().map(|&(lo, _)| u32::from(lo))),
            Label::Set {
                ranges,
                negated: true,
            } => {
                out.push(0);
                out.extend(ranges.iter().map(|&(_, hi)| u32::from(hi) + 1));
            }
        }
    }

    fn overlaps(&self, other: &Label) -> bool {
        if let (Label::Char(a), Label::Char(b)) = (self, other) {
            return a == b;
        }
        let mut candidates = Vec::with_capacity(8);
        self.starts(&mut candidates);
        other.starts(&mut candidates);
        // '/' is cut out of every wildcard and the surrogate gap is not a char
        candidates.push(u32::from('/') + 1);
        candidates.push(0xE000);
        candidates
            .into_iter()
            .filter_map(char::from_u32)
            .any(|c| self.accepts(c) && other.accepts(c))
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    edges: Vec<(Label, usize)>,
    epsilon: Vec<usize>,
}

/// A nondeterministic automaton with a single start (state 0) and a single
/// accepting state.
#[derive(Debug, Clone)]
struct Automaton {
    states: Vec<State>,
    accept: usize,
    /// Epsilon closure of every state, itself included.
    closures: Vec<Vec<usize>>,
}

impl Automaton {
    fn compile(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut states = vec![State::default()];
        let mut current = 0;
        let mut i = 0;

        let push = |states: &mut Vec<State>| {
            states.push(State::default());
            states.len() - 1
        };

        while i < chars.len() {
            match chars[i] {
                '?' => {
                    let next = push(&mut states);
                    states[current].edges.push((Label::Any, next));
                    current = next;
                    i += 1;
                }
                '*' => {
                    let next = push(&mut states);
                    states[current].epsilon.push(next);
                    states[next].edges.push((Label::Any, next));
                    current = next;
                    i += 1;
                }
                '[' => match parse_set(&chars, i) {
                    Some((label, end)) => {
                        let next = push(&mut states);
                        states[current].edges.push((label, next));
                        current = next;
                        i = end;
                    }
                    None => {
                        let next = push(&mut states);
                        states[current].edges.push((Label::Char('['), next));
                        current = next;
                        i += 1;
                    }
                },
                '{' => match chars[i + 1..].iter().position(|&c| c == '}') {
                    Some(len) => {
                        let body = &chars[i + 1..i + 1 + len];
                        let join = push(&mut states);
                        for alternative in body.split(|&c| c == ',') {
                            let mut at = current;
                            for &c in alternative {
                                let next = push(&mut states);
                                states[at].edges.push((Label::Char(c), next));
                                at = next;
                            }
                            states[at].epsilon.push(join);
                        }
                        current = join;
                        i += len + 2;
                    }
                    None => {
                        let next = push(&mut states);
                        states[current].edges.push((Label::Char('{'), next));
                        current = next;
                        i += 1;
                    }
                },
                c => {
                    let next = push(&mut states);
                    states[current].edges.push((Label::Char(c), next));
                    current = next;
                    i += 1;
                }
            }
        }

        let closures = (0..states.len())
            .map(|start| epsilon_closure(&states, start))
            .collect();
        Self {
            states,
            accept: current,
            closures,
        }
    }

    /// Search the product of both automata. Returns true when both can reach
    /// their accepting states on the same input.
    fn intersects(&self, other: &Automaton) -> bool {
        let mut seen = HashSet::new();
        let mut queue = vec![(0, 0)];
        seen.insert((0, 0));

        while let Some((a, b)) = queue.pop() {
            for &x in &self.closures[a] {
                for &y in &other.closures[b] {
                    if x == self.accept && y == other.accept {
                        return true;
                    }
                    for (label_x, next_x) in &self.states[x].edges {
                        for (label_y, next_y) in &other.states[y].edges {
                            let pair = (*next_x, *next_y);
                            if !seen.contains(&pair) && label_x.overlaps(label_y) {
                                seen.insert(pair);
                                queue.push(pair);
                            }
                        }
                    }
                }
            }
        }
        false
    }
}

fn epsilon_closure(states: &[State], start: usize) -> Vec<usize> {
    let mut closure = vec![start];
    let mut i = 0;
    while i < closure.len() {
        for &next in &states[closure[i]].epsilon {
            if !closure.contains(&next) {
                closure.push(next);
            }
        }
        i += 1;
    }
    closure
}

/// Parse a bracket expression starting at `chars[open]`. Returns the label
/// and the index just past the closing `]`, or `None` if it never closes.
fn parse_set(chars: &[char], open: usize) -> Option<(Label, usize)> {
    let mut i = open + 1;
    let negated = chars.get(i) == Some(&'!');
    if negated {
        i += 1;
    }
    let close = i + chars[i..].iter().position(|&c| c == ']')?;

    let body = &chars[i..close];
    let mut ranges = Vec::new();
    let mut j = 0;
    while j < body.len() {
        if j + 2 < body.len() && body[j + 1] == '-' {
            let (a, b) = (body[j], body[j + 2]);
            ranges.push((a.min(b), a.max(b)));
            j += 3;
        } else {
            ranges.push((body[j], body[j]));
            j += 1;
        }
    }
    Some((Label::Set { ranges, negated }, close + 1))
}
