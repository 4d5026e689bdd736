// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C3 linearization of class hierarchies.

/// Merges `seqs` into one C3 linearization.
///
/// Each sequence is the linearization of one base followed, as the last
/// sequence, by the list of bases itself. `same` decides identity. Returns
/// `None` when no consistent order exists.
pub(crate) fn c3<T: Clone>(mut seqs: Vec<Vec<T>>, same: impl Fn(&T, &T) -> bool) -> Option<Vec<T>> {
    let mut out = Vec::new();
    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Some(out);
        }
        // First head that appears in no tail.
        let head = seqs.iter().map(|s| &s[0]).find(|&candidate| {
            !seqs
                .iter()
                .any(|s| s[1..].iter().any(|t| same(t, candidate)))
        })?;
        let head = head.clone();
        for seq in &mut seqs {
            if same(&seq[0], &head) {
                seq.remove(0);
            }
        }
        out.push(head);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linearize(seqs: &[&[char]]) -> Option<String> {
        let seqs = seqs.iter().map(|s| s.to_vec()).collect();
        c3(seqs, |a, b| a == b).map(|v| v.into_iter().collect())
    }

    #[test]
    fn single_chain() {
        // C(B), B(A)
        assert_eq!(linearize(&[&['B', 'A'], &['B']]).as_deref(), Some("BA"));
    }

    #[test]
    fn diamond() {
        // D(B, C), B(A), C(A)
        assert_eq!(
            linearize(&[&['B', 'A'], &['C', 'A'], &['B', 'C']]).as_deref(),
            Some("BCA")
        );
    }

    #[test]
    fn inconsistent_order_is_rejected() {
        // Z(X, Y) where X(A, B) and Y(B, A)
        assert_eq!(
            linearize(&[&['X', 'A', 'B'], &['Y', 'B', 'A'], &['X', 'Y']]),
            None
        );
    }
}
