/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    /// Fixed-width bit-vector.
    BitVec(u32),
}

impl SmtSort {
    /// Number of bits needed to hold a value of this sort.
    pub fn width(&self) -> u32 {
        match self {
            SmtSort::Bool => 1,
            SmtSort::BitVec(w) => *w,
        }
    }

    /// Number of distinct values of this sort, when it fits in a `u64`.
    pub fn cardinality(&self) -> Option<u64> {
        1u64.checked_shl(self.width())
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::BitVec(w) => write!(f, "(_ BitVec {w})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitvec_sort_renders_as_indexed_identifier() {
        assert_eq!(SmtSort::BitVec(3).to_string(), "(_ BitVec 3)");
        assert_eq!(SmtSort::Bool.to_string(), "Bool");
    }

    #[test]
    fn cardinality_saturates_on_wide_sorts() {
        assert_eq!(SmtSort::Bool.cardinality(), Some(2));
        assert_eq!(SmtSort::BitVec(4).cardinality(), Some(16));
        assert_eq!(SmtSort::BitVec(64).cardinality(), None);
    }
}
