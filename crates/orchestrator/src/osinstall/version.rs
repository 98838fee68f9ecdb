#![forbid(unsafe_code)]

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Number(u64),
    Text(String),
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lenient dotted version such as `10.12.4`, `10.13` or `10.12.4b3`.
///
/// Components split on `.` and on digit/letter boundaries. The shorter of two
/// versions is padded with zeros, so `10.13` equals `10.13.0`. An empty
/// version sorts before every real one.
#[derive(Debug, Clone)]
pub struct LooseVersion {
    components: Vec<Component>,
}

impl LooseVersion {
    pub fn parse(text: &str) -> Self {
        let mut components = Vec::new();
        for part in text.trim().split('.') {
            let mut rest = part;
            while let Some(first) = rest.chars().next() {
                let digits = first.is_ascii_digit();
                let end = rest
                    .find(|c: char| c.is_ascii_digit() != digits)
                    .unwrap_or(rest.len());
                let (token, tail) = rest.split_at(end);
                components.push(match token.parse::<u64>() {
                    Ok(n) if digits => Component::Number(n),
                    _ => Component::Text(token.to_owned()),
                });
                rest = tail;
            }
        }
        Self { components }
    }

    fn padded(&self, len: usize) -> impl Iterator<Item = &Component> {
        static ZERO: Component = Component::Number(0);
        self.components
            .iter()
            .chain(std::iter::repeat(&ZERO))
            .take(len)
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        self.padded(len).cmp(other.padded(len))
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LooseVersion {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(text: &str) -> LooseVersion {
        LooseVersion::parse(text)
    }

    #[test]
    fn orders_dotted_versions_numerically() {
        assert!(v("10.12.3") < v("10.12.4"));
        assert!(v("10.12.10") > v("10.12.4"));
        assert!(v("10.13") > v("10.12.4"));
        assert!(v("11.0.1") > v("10.15.7"));
        assert_eq!(v("10.13"), v("10.13.0"));
    }

    #[test]
    fn unknown_version_sorts_first() {
        assert!(v("") < v("10.12.4"));
        assert!(v("") < v("0.1"));
    }

    #[test]
    fn letters_split_components() {
        assert!(v("10.12.4b3") > v("10.12.4"));
        assert!(v("10.12.4b3") < v("10.12.5"));
        assert!(v("10.12.4b3") < v("10.12.4b10"));
    }

    proptest! {
        #[test]
        fn numeric_triples_order_like_tuples(
            a in (0u64..50, 0u64..50, 0u64..50),
            b in (0u64..50, 0u64..50, 0u64..50),
        ) {
            let va = v(&format!("{}.{}.{}", a.0, a.1, a.2));
            let vb = v(&format!("{}.{}.{}", b.0, b.1, b.2));
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }
    }
}
