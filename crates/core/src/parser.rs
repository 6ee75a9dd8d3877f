use crate::error::IngestError;
use crate::models::{Course, Lesson};
use regex::Regex;

/// Parser output: course metadata plus raw per-lesson body text, kept in
/// document order. Lesson numbers are not required to be contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub course: Course,
    /// Text found before the first lesson marker, if any.
    pub preamble: Option<String>,
    pub lesson_bodies: Vec<(u32, String)>,
}

const TITLE_HEADER: &str = "Course Title:";
const LINK_HEADER: &str = "Course Link:";
const INSTRUCTOR_HEADER: &str = "Course Instructor:";
const LESSON_LINK_HEADER: &str = "Lesson Link:";

/// Parse one raw course document.
///
/// The first three non-empty lines are checked for `Course Title:`,
/// `Course Link:` and `Course Instructor:` headers, accepted in any subset
/// and order; the title is mandatory. The rest of the text is segmented at
/// `Lesson <n>: <title>` markers, with an optional `Lesson Link:` line
/// directly after a marker captured as that lesson's link and excluded from
/// its body.
pub fn parse_course_document(text: &str) -> Result<ParsedDocument, IngestError> {
    let lines: Vec<&str> = text.lines().collect();

    let mut title = None;
    let mut course_link = None;
    let mut instructor = None;

    let mut body_start = 0;
    let mut headers_seen = 0;
    for (index, line) in lines.iter().enumerate() {
        if headers_seen == 3 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            body_start = index + 1;
            continue;
        }
        if let Some(value) = header_value(trimmed, TITLE_HEADER) {
            title = Some(value);
        } else if let Some(value) = header_value(trimmed, LINK_HEADER) {
            course_link = Some(value);
        } else if let Some(value) = header_value(trimmed, INSTRUCTOR_HEADER) {
            instructor = Some(value);
        } else {
            break;
        }
        headers_seen += 1;
        body_start = index + 1;
    }

    let title = title.ok_or_else(|| {
        IngestError::MalformedDocument("missing 'Course Title:' header".to_string())
    })?;

    let marker = Regex::new(r"^Lesson\s+(\d+):\s*(.*)$")?;

    let mut lessons = Vec::new();
    let mut lesson_bodies: Vec<(u32, String)> = Vec::new();
    let mut preamble_lines: Vec<&str> = Vec::new();
    let mut current: Option<(u32, Vec<&str>)> = None;

    let mut index = body_start;
    while index < lines.len() {
        let line = lines[index];

        if let Some(captures) = marker.captures(line) {
            if let Some((number, body)) = current.take() {
                lesson_bodies.push((number, body.join("\n").trim().to_string()));
            }

            let number: u32 = captures[1].parse().map_err(|_| {
                IngestError::MalformedDocument(format!("lesson number out of range: {line}"))
            })?;
            let lesson_title = captures[2].trim().to_string();

            let mut link = None;
            if let Some(next) = lines.get(index + 1) {
                if let Some(value) = header_value(next.trim(), LESSON_LINK_HEADER) {
                    link = Some(value);
                    index += 1;
                }
            }

            lessons.push(Lesson {
                number,
                title: lesson_title,
                link,
            });
            current = Some((number, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        } else {
            preamble_lines.push(line);
        }

        index += 1;
    }

    if let Some((number, body)) = current.take() {
        lesson_bodies.push((number, body.join("\n").trim().to_string()));
    }

    let preamble = Some(preamble_lines.join("\n").trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(ParsedDocument {
        course: Course {
            title,
            course_link,
            instructor,
            lessons,
        },
        preamble,
        lesson_bodies,
    })
}

fn header_value(line: &str, header: &str) -> Option<String> {
    line.strip_prefix(header)
        .map(|value| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Course Title: Test Course: AI Fundamentals
Course Link: https://example.com/ai-fundamentals
Course Instructor: Test Instructor

Lesson 0: Introduction to AI
Lesson Link: https://example.com/lesson/0
This is an introduction to artificial intelligence.

Lesson 1: Machine Learning Basics
Lesson Link: https://example.com/lesson/1
Machine learning is a subset of artificial intelligence.

Lesson 2: Neural Networks
Neural networks are computing systems inspired by biology.";

    #[test]
    fn parses_full_document() {
        let parsed = parse_course_document(SAMPLE).unwrap();

        assert_eq!(parsed.course.title, "Test Course: AI Fundamentals");
        assert_eq!(
            parsed.course.course_link.as_deref(),
            Some("https://example.com/ai-fundamentals")
        );
        assert_eq!(parsed.course.instructor.as_deref(), Some("Test Instructor"));
        assert_eq!(parsed.course.lessons.len(), 3);
        assert_eq!(parsed.course.lessons[0].number, 0);
        assert_eq!(parsed.course.lessons[0].title, "Introduction to AI");
        assert_eq!(
            parsed.course.lessons[0].link.as_deref(),
            Some("https://example.com/lesson/0")
        );
        assert_eq!(parsed.course.lessons[2].link, None);

        assert_eq!(parsed.preamble, None);
        assert_eq!(parsed.lesson_bodies.len(), 3);
        assert_eq!(
            parsed.lesson_bodies[0].1,
            "This is an introduction to artificial intelligence."
        );
        // Lesson link lines never leak into bodies.
        assert!(!parsed.lesson_bodies[1].1.contains("Lesson Link:"));
    }

    #[test]
    fn missing_title_is_malformed() {
        let document = "Course Instructor: Someone\n\nLesson 0: Intro\nBody text.";
        let error = parse_course_document(document).unwrap_err();
        assert!(matches!(error, IngestError::MalformedDocument(_)));
    }

    #[test]
    fn headers_accepted_in_any_order_and_subset() {
        let document = "\
Course Instructor: Prof. X
Course Title: Minimal Course
Lesson 0: Only Lesson
Body.";
        let parsed = parse_course_document(document).unwrap();
        assert_eq!(parsed.course.title, "Minimal Course");
        assert_eq!(parsed.course.instructor.as_deref(), Some("Prof. X"));
        assert_eq!(parsed.course.course_link, None);
        assert_eq!(parsed.lesson_bodies, vec![(0, "Body.".to_string())]);
    }

    #[test]
    fn text_before_first_marker_becomes_preamble() {
        let document = "\
Course Title: Preamble Course

Some opening remarks that belong to no lesson.

Lesson 1: First
Lesson body.";
        let parsed = parse_course_document(document).unwrap();
        assert_eq!(
            parsed.preamble.as_deref(),
            Some("Some opening remarks that belong to no lesson.")
        );
        assert_eq!(parsed.lesson_bodies, vec![(1, "Lesson body.".to_string())]);
    }

    #[test]
    fn lesson_numbers_may_be_non_contiguous() {
        let document = "\
Course Title: Gaps

Lesson 2: Two
Body two.

Lesson 7: Seven
Body seven.";
        let parsed = parse_course_document(document).unwrap();
        let numbers: Vec<u32> = parsed.course.lessons.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![2, 7]);
        assert_eq!(parsed.lesson_bodies[0].0, 2);
        assert_eq!(parsed.lesson_bodies[1].0, 7);
    }

    #[test]
    fn document_without_markers_is_all_preamble() {
        let document = "Course Title: No Lessons\n\nJust some text.";
        let parsed = parse_course_document(document).unwrap();
        assert!(parsed.course.lessons.is_empty());
        assert!(parsed.lesson_bodies.is_empty());
        assert_eq!(parsed.preamble.as_deref(), Some("Just some text."));
    }

    #[test]
    fn parsing_is_deterministic() {
        let first = parse_course_document(SAMPLE).unwrap();
        let second = parse_course_document(SAMPLE).unwrap();
        assert_eq!(first, second);
    }
}
