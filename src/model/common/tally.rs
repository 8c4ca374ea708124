use serde::{Deserialize, Serialize};

use super::choice::VoteChoice;

/// Aggregate result for a motion. `total` is always `yes + no`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u64,
    pub no: u64,
    pub total: u64,
}

impl Tally {
    /// Reduce a sequence of choices into a tally.
    pub fn from_choices(choices: impl IntoIterator<Item = VoteChoice>) -> Self {
        choices.into_iter().fold(Self::default(), Self::add)
    }

    fn add(mut self, choice: VoteChoice) -> Self {
        match choice {
            VoteChoice::Yes => self.yes += 1,
            VoteChoice::No => self.no += 1,
        }
        self.total += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tally_is_zero() {
        assert_eq!(
            Tally::from_choices([]),
            Tally {
                yes: 0,
                no: 0,
                total: 0
            }
        );
    }

    #[test]
    fn tally_is_order_independent() {
        use VoteChoice::*;
        let a = Tally::from_choices([Yes, No, Yes, Yes]);
        let b = Tally::from_choices([Yes, Yes, No, Yes]);
        assert_eq!(a, b);
        assert_eq!(a.yes, 3);
        assert_eq!(a.no, 1);
        assert_eq!(a.yes + a.no, a.total);
    }
}
