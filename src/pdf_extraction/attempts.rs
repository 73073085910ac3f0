// Ordered attempts: run candidates in sequence and stop at the first accepted value.
// Shared by the page technique ladder and the document open ladder.

/// Outcome of running an ordered list of candidates.
#[derive(Debug)]
pub struct Attempted<A, T, E> {
    pub accepted: Option<(A, T)>,
    /// Candidates that ran cleanly but whose value was not accepted.
    pub rejected: Vec<A>,
    pub failed: Vec<(A, E)>,
}

impl<A, T, E> Attempted<A, T, E> {
    pub fn attempts(&self) -> usize {
        usize::from(self.accepted.is_some()) + self.rejected.len() + self.failed.len()
    }

    pub fn last_error(&self) -> Option<&E> {
        self.failed.last().map(|(_, e)| e)
    }
}

/// Runs `run` over `candidates` in order, returning as soon as `accept` passes.
pub fn first_accepted<A, T, E, I, R, P>(candidates: I, mut run: R, accept: P) -> Attempted<A, T, E>
where
    I: IntoIterator<Item = A>,
    R: FnMut(&A) -> Result<T, E>,
    P: Fn(&T) -> bool,
{
    let mut rejected = Vec::new();
    let mut failed = Vec::new();

    for candidate in candidates {
        match run(&candidate) {
            Ok(value) if accept(&value) => {
                return Attempted {
                    accepted: Some((candidate, value)),
                    rejected,
                    failed,
                };
            }
            Ok(_) => rejected.push(candidate),
            Err(err) => failed.push((candidate, err)),
        }
    }

    Attempted {
        accepted: None,
        rejected,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_at_first_accepted() {
        let mut calls = Vec::new();
        let outcome: Attempted<u32, u32, String> = first_accepted(
            [1, 2, 3, 4],
            |n| {
                calls.push(*n);
                Ok(n * 10)
            },
            |v| *v >= 20,
        );

        assert_eq!(outcome.accepted, Some((2, 20)));
        assert_eq!(outcome.rejected, vec![1]);
        assert_eq!(calls, vec![1, 2]);
        assert_eq!(outcome.attempts(), 2);
    }

    #[test]
    fn test_errors_fall_through() {
        let outcome: Attempted<&str, (), String> = first_accepted(
            ["a", "b"],
            |name| Err(format!("{} failed", name)),
            |_| true,
        );

        assert!(outcome.accepted.is_none());
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.last_error().map(String::as_str), Some("b failed"));
    }
}
