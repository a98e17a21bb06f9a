//! Word counting and reading time

use crate::content::ContentSection;

/// Words read per minute when estimating reading time
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// Count whitespace-delimited words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Total words of a post body: every section heading plus the plain text of
/// its rich-text body
pub fn total_words(sections: &[ContentSection]) -> usize {
    sections
        .iter()
        .map(|section| count_words(&section.heading) + count_words(&section.body.as_text()))
        .sum()
}

/// Estimated reading time in whole minutes, rounded up
pub fn estimate_reading_time(sections: &[ContentSection], words_per_minute: u32) -> u32 {
    let wpm = words_per_minute.max(1) as usize;
    total_words(sections).div_ceil(wpm) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::RichText;

    fn section(heading: &str, body: &str) -> ContentSection {
        ContentSection {
            heading: heading.to_string(),
            body: RichText::paragraphs([body]),
        }
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("um  dois\ntrês\tquatro"), 4);
    }

    #[test]
    fn test_no_sections_is_zero_minutes() {
        assert_eq!(estimate_reading_time(&[], DEFAULT_WORDS_PER_MINUTE), 0);
    }

    #[test]
    fn test_two_words_round_up_to_one_minute() {
        let sections = vec![ContentSection {
            heading: "A B".to_string(),
            body: RichText::default(),
        }];
        assert_eq!(total_words(&sections), 2);
        assert_eq!(estimate_reading_time(&sections, DEFAULT_WORDS_PER_MINUTE), 1);
    }

    #[test]
    fn test_counts_heading_and_body() {
        let body = vec!["palavra"; 399].join(" ");
        let sections = vec![section("Título", &body)];
        assert_eq!(total_words(&sections), 400);
        assert_eq!(estimate_reading_time(&sections, DEFAULT_WORDS_PER_MINUTE), 2);

        let sections = vec![section("Título", &body), section("Outro", "")];
        assert_eq!(total_words(&sections), 401);
        assert_eq!(estimate_reading_time(&sections, DEFAULT_WORDS_PER_MINUTE), 3);
    }

    #[test]
    fn test_reading_time_is_monotonic() {
        let mut previous = 0;
        for words in 0..1000 {
            let body = vec!["x"; words].join(" ");
            let minutes = estimate_reading_time(&[section("", &body)], DEFAULT_WORDS_PER_MINUTE);
            assert!(minutes >= previous, "{} words went from {} to {}", words, previous, minutes);
            previous = minutes;
        }
        assert_eq!(previous, 5);
    }
}
