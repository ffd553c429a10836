/// Final-project question marks are bounded to [0.5, 10].
pub fn validate_question_mark(mark: f64) -> bool {
    (0.5..=10.0).contains(&mark)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_bounds() {
        assert!(validate_question_mark(0.5));
        assert!(validate_question_mark(10.0));
        assert!(!validate_question_mark(0.4));
        assert!(!validate_question_mark(10.1));
    }
}
