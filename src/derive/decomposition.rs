/// Solved/error totals for one solver, with the derived "solved without error" figure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorDecomposition {
    pub solved: u64,
    pub solved_with_error: u64,
    pub unparseable: u64,
    pub unsolvable: u64,
}

impl ErrorDecomposition {
    /// `solved - solved_with_error`, clamped at 0 when the counts disagree
    pub fn solved_without_error(&self) -> u64 {
        self.solved.saturating_sub(self.solved_with_error)
    }

    /// False when an error count exceeds the total it is a subset of
    pub fn is_consistent(&self) -> bool {
        self.solved_with_error <= self.solved
            && self.unparseable <= self.solved_with_error
            && self.unsolvable <= self.solved_with_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solved_without_error() {
        let d = ErrorDecomposition { solved: 50, solved_with_error: 5, unparseable: 2, unsolvable: 3 };
        assert_eq!(d.solved_without_error(), 45);
        assert!(d.is_consistent());
    }

    #[test]
    fn test_more_errors_than_solved_clamps_and_flags() {
        let d = ErrorDecomposition { solved: 5, solved_with_error: 8, unparseable: 0, unsolvable: 0 };
        assert_eq!(d.solved_without_error(), 0);
        assert!(!d.is_consistent());
    }

    #[test]
    fn test_subclass_above_total_is_inconsistent() {
        let d = ErrorDecomposition { solved: 10, solved_with_error: 2, unparseable: 3, unsolvable: 0 };
        assert_eq!(d.solved_without_error(), 8);
        assert!(!d.is_consistent());
    }
}
