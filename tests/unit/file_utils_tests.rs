/*!
 * Tests for export file naming and the directory sink
 */

use anyhow::Result;
use captrack::export::ExportSink;
use captrack::file_utils::{sanitize_file_name, subtitle_filename, DirectorySink, FileManager, BOM};
use captrack::subtitle_processor::SubtitleFormat;
use tempfile::TempDir;

/// Test sanitization of a title with path and query characters
#[test]
fn test_sanitize_file_name_withReservedCharacters_shouldReplaceEach() {
    let sanitized = sanitize_file_name("My/Video:Test?");
    assert!(sanitized.starts_with("My_Video_Test_"));
    assert_eq!(
        subtitle_filename("My/Video:Test?", "en", SubtitleFormat::Srt),
        "My_Video_Test__en.srt"
    );
}

/// Test that control characters are replaced too
#[test]
fn test_sanitize_file_name_withControlCharacters_shouldReplaceThem() {
    assert_eq!(sanitize_file_name("a\tb\nc\u{1f}d"), "a_b_c_d");
}

/// Test the directory sink writes files and never overwrites
#[tokio::test]
async fn test_directory_sink_withRepeatedName_shouldKeepBothFiles() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output_dir = temp_dir.path().join("nested").join("subs");
    let sink = DirectorySink::new(&output_dir);

    let contents = format!("{}1\n00:00:00,000 --> 00:00:01,000\nHi\n\n", BOM);
    sink.emit_file("Talk_en.srt", &contents).await?;
    sink.emit_file("Talk_en.srt", &contents).await?;

    assert!(FileManager::file_exists(output_dir.join("Talk_en.srt")));
    assert!(FileManager::file_exists(output_dir.join("Talk_en (1).srt")));
    let written = std::fs::read(output_dir.join("Talk_en.srt"))?;
    assert!(written.starts_with(&[0xEF, 0xBB, 0xBF]));
    assert_eq!(sink.output_dir(), output_dir.as_path());
    Ok(())
}

/// Test writing a file creates its parent directory
#[test]
fn test_write_to_file_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config").join("conf.json");
    FileManager::write_to_file(&path, "{}")?;
    assert!(FileManager::file_exists(&path));
    assert!(!FileManager::file_exists(temp_dir.path().join("config")));
    Ok(())
}

/// Test the directory sink prints the clipboard payload instead of failing
#[test]
fn test_directory_sink_clipboard_shouldSucceedWithoutHostClipboard() {
    let temp_dir = TempDir::new().unwrap();
    let sink = DirectorySink::new(temp_dir.path());

    let result = tokio_test::block_on(async { sink.write_clipboard("=== English ===\nHi\n\n").await });
    assert!(result.is_ok());
    assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
}
