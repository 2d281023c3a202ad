//! Merges per-slice transcription results for one file into a single
//! time-consistent transcript, re-anchoring each slice's segment
//! timestamps by that slice's absolute offset in the source audio.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Outcome of transcribing one slice (or whole-file batch entry).
#[derive(Debug, Clone, PartialEq)]
pub enum SliceResult {
    Ok {
        index: usize,
        transcript: String,
        language: Option<String>,
        language_probability: Option<f32>,
        segments: Vec<Segment>,
        slice_start_time: f64,
    },
    Err {
        index: usize,
        error: String,
    },
}

impl SliceResult {
    pub fn index(&self) -> usize {
        match self {
            SliceResult::Ok { index, .. } => *index,
            SliceResult::Err { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub filename: String,
    pub transcript: String,
    pub language: Option<String>,
    pub language_probability: Option<f32>,
    pub segments: Vec<Segment>,
    pub total_segments: usize,
    pub slice_count: usize,
    pub processing_mode: String,
    pub original_duration: f64,
    pub warning: Option<String>,
    pub error: Option<String>,
}

/// A `FileResult` for a file that failed before any slice/batch transcription
/// was attempted (validation failure, slice decode failure, ...).
pub fn error_result(filename: &str, processing_mode: &str, error: impl Into<String>) -> FileResult {
    FileResult {
        filename: filename.to_string(),
        transcript: String::new(),
        language: None,
        language_probability: None,
        segments: Vec::new(),
        total_segments: 0,
        slice_count: 0,
        processing_mode: processing_mode.to_string(),
        original_duration: 0.0,
        warning: None,
        error: Some(error.into()),
    }
}

/// Combine every `SliceResult` for one file into a `FileResult`.
pub fn aggregate_results(
    filename: &str,
    processing_mode: &str,
    original_duration: f64,
    mut results: Vec<SliceResult>,
) -> FileResult {
    results.sort_by(|a, b| a.index().cmp(&b.index()));

    let slice_count = results.len();
    let mut transcript_parts = Vec::new();
    let mut segments = Vec::new();
    let mut language = None;
    let mut language_probability = None;
    let mut failed = 0usize;

    for result in &results {
        match result {
            SliceResult::Ok {
                transcript,
                language: lang,
                language_probability: prob,
                segments: slice_segments,
                slice_start_time,
                ..
            } => {
                if !transcript.is_empty() {
                    transcript_parts.push(transcript.clone());
                }
                for segment in slice_segments {
                    segments.push(Segment {
                        start: segment.start + slice_start_time,
                        end: segment.end + slice_start_time,
                        text: segment.text.clone(),
                    });
                }
                if language.is_none() && lang.is_some() {
                    language = lang.clone();
                    language_probability = *prob;
                }
            }
            SliceResult::Err { index, error } => {
                failed += 1;
                log::warn!("slice {index} failed: {error}");
            }
        }
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let transcript = transcript_parts.join(" ").trim_end().to_string();
    let warning = if failed > 0 {
        Some(format!("{failed}/{slice_count} slices failed; result may be incomplete"))
    } else {
        None
    };

    FileResult {
        filename: filename.to_string(),
        transcript,
        language,
        language_probability,
        total_segments: segments.len(),
        segments,
        slice_count,
        processing_mode: processing_mode.to_string(),
        original_duration,
        warning,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(index: usize, transcript: &str, start: f64, slice_start: f64) -> SliceResult {
        SliceResult::Ok {
            index,
            transcript: transcript.to_string(),
            language: Some("en".to_string()),
            language_probability: Some(0.9),
            segments: vec![Segment { start, end: start + 1.0, text: transcript.to_string() }],
            slice_start_time: slice_start,
        }
    }

    #[test]
    fn reanchors_timestamps_by_slice_offset() {
        let results = vec![ok(0, "hello", 0.0, 0.0), ok(1, "world", 0.0, 10.0)];
        let file = aggregate_results("a.wav", "slice_only", 20.0, results);
        assert_eq!(file.transcript, "hello world");
        assert_eq!(file.segments[0].start, 0.0);
        assert_eq!(file.segments[1].start, 10.0);
    }

    #[test]
    fn out_of_order_slices_are_sorted_by_index_then_segment_start() {
        let results = vec![ok(1, "world", 0.0, 10.0), ok(0, "hello", 0.0, 0.0)];
        let file = aggregate_results("a.wav", "slice_only", 20.0, results);
        assert_eq!(file.transcript, "hello world");
        assert!(file.segments.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn failed_slices_produce_warning() {
        let results = vec![ok(0, "hello", 0.0, 0.0), SliceResult::Err { index: 1, error: "timeout".into() }];
        let file = aggregate_results("a.wav", "slice_only", 20.0, results);
        assert_eq!(file.warning, Some("1/2 slices failed; result may be incomplete".to_string()));
    }

    #[test]
    fn language_comes_from_first_reporting_slice() {
        let mut second = ok(1, "world", 0.0, 10.0);
        if let SliceResult::Ok { language, .. } = &mut second {
            *language = Some("fr".to_string());
        }
        let first_no_lang = SliceResult::Ok {
            index: 0,
            transcript: "hello".into(),
            language: None,
            language_probability: None,
            segments: vec![],
            slice_start_time: 0.0,
        };
        let file = aggregate_results("a.wav", "slice_only", 20.0, vec![first_no_lang, second]);
        assert_eq!(file.language, Some("fr".to_string()));
    }
}
