mod common;

use common::{collect_errors, manifest, set_compression_method, write_archive, VERSION_LINE};
use import_validator_core::{ErrorKind, ValidateError, Validator, ValidatorConfig};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn default_policy_stops_at_first_defect() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            VERSION_LINE,
            r#"{"type":"team","team":{"name":"eng"}}"#,
            r#"{"type":"team","team":{"name":"eng"}}"#,
            r#"{"type":"post","post":{}}"#,
        ]),
        &[],
    );

    let mut v = Validator::new(&path);
    let err = v.validate().unwrap_err();
    assert!(!err.is_fatal());
    let defect = err.validation_error().unwrap();
    assert_eq!(defect.kind(), ErrorKind::DUPLICATE_ENTITY);
    assert_eq!(defect.line_number(), Some(3));
    assert!(err.to_string().starts_with("import validation error in"));
    assert_eq!(v.post_count(), 0);
}

#[test]
fn resetting_the_policy_restores_abort_on_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[VERSION_LINE, r#"{"type":"bot","bot":{}}"#]),
        &[],
    );

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.set_error_policy(None);
    assert!(matches!(v.validate(), Err(ValidateError::Invalid(_))));
    assert!(errors.borrow().is_empty());
}

#[test]
fn custom_policy_can_abort_with_its_own_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            VERSION_LINE,
            r#"{"type":"post","post":{}}"#,
            r#"{"type":"post","post":{}}"#,
            r#"{"type":"post","post":{}}"#,
        ]),
        &[],
    );

    let seen = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&seen);
    let mut v = Validator::new(&path);
    v.on_error(move |_| {
        *counter.borrow_mut() += 1;
        if *counter.borrow() == 2 {
            return Err(ValidateError::Aborted("too many errors".to_string()));
        }
        Ok(())
    });

    let err = v.validate().unwrap_err();
    assert_eq!(err.to_string(), "validation aborted: too many errors");
    assert_eq!(*seen.borrow(), 2);
    // The aborting record is not counted.
    assert_eq!(v.post_count(), 1);
}

#[test]
fn empty_lines_are_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            "",
            VERSION_LINE,
            "   ",
            r#"{"type":"team","team":{"name":"eng"}}"#,
            "\u{a0}\t",
        ]),
        &[],
    );

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.validate().unwrap();

    let errors = errors.borrow();
    let kinds: Vec<(ErrorKind, Option<u64>)> =
        errors.iter().map(|e| (e.kind(), e.line_number())).collect();
    assert_eq!(
        kinds,
        vec![
            (ErrorKind::UNEXPECTED_EMPTY_LINE, Some(1)),
            (ErrorKind::UNEXPECTED_EMPTY_LINE, Some(3)),
            (ErrorKind::UNEXPECTED_EMPTY_LINE, Some(5)),
        ]
    );
    assert_eq!(v.teams(), vec!["eng"]);
    assert_eq!(v.total_lines(), 5);
}

#[test]
fn malformed_json_falls_through_to_type_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[VERSION_LINE, r#"{"type":"team","team":"#]),
        &[],
    );

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.validate().unwrap();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].kind(), ErrorKind::JSON_DECODE);
    assert_eq!(errors[0].field_name(), None);
    assert!(errors[0].cause().is_some());
    assert_eq!(errors[1].kind(), ErrorKind::UNKNOWN_RECORD_TYPE);
    assert_eq!(errors[1].field_name(), Some("type"));
}

#[test]
fn malformed_first_line_reports_missing_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(dir.path(), &manifest(&["not json"]), &[]);

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.validate().unwrap();

    let kinds: Vec<ErrorKind> = errors.borrow().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![ErrorKind::JSON_DECODE, ErrorKind::MISSING_VERSION_FIRST]
    );
}

#[test]
fn unknown_record_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[VERSION_LINE, r#"{"type":"bot","bot":{"username":"x"}}"#]),
        &[],
    );

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.validate().unwrap();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::UNKNOWN_RECORD_TYPE);
    assert!(errors[0].cause_message().contains("\"bot\""));
}

#[test]
fn missing_payload_is_reported_per_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            VERSION_LINE,
            r#"{"type":"scheme"}"#,
            r#"{"type":"user","user":null}"#,
            r#"{"type":"version"}"#,
        ]),
        &[],
    );

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    v.validate().unwrap();

    let fields: Vec<Option<String>> = errors
        .borrow()
        .iter()
        .inspect(|e| assert_eq!(e.kind(), ErrorKind::MISSING_PAYLOAD))
        .map(|e| e.field_name().map(str::to_string))
        .collect();
    assert_eq!(
        fields,
        vec![
            Some("scheme".to_string()),
            Some("user".to_string()),
            Some("version".to_string()),
        ]
    );
}

#[test]
fn error_sequence_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            r#"{"type":"team","team":{"name":"eng"}}"#,
            "",
            r#"{"type":"channel","channel":{"name":"c1","team":"ghost"}}"#,
            r#"{"type":"user","user":{"username":"Bad Name"}}"#,
            r#"{"type":"post","post":{"team":"eng"}}"#,
            r#"{"type":"emoji","emoji":{"name":"x","image":"none.png"}}"#,
        ]),
        &[],
    );

    let run = || {
        let mut v = Validator::new(&path);
        let errors = collect_errors(&mut v);
        v.validate().unwrap();
        let out: Vec<String> = errors.borrow().iter().map(|e| e.to_string()).collect();
        out
    };
    let first = run();
    assert_eq!(first.len(), 6);
    assert_eq!(first, run());
}

#[test]
fn accepted_suggestion_injects_the_team() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[
            VERSION_LINE,
            r#"{"type":"team","team":{"name":"eng"}}"#,
            r#"{"type":"channel","channel":{"name":"c1","team":"eng-west"}}"#,
            r#"{"type":"channel","channel":{"name":"c2","team":"eng-west"}}"#,
        ]),
        &[],
    );

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut v = Validator::new(&path);
    v.on_error(move |e| {
        assert_eq!(e.suggested_values().to_vec(), vec!["eng".to_string()]);
        assert!(e.suggestion().unwrap().contains("inject team \"eng-west\""));
        if let Some(apply) = e.apply_suggestion() {
            apply.apply();
        }
        sink.borrow_mut().push(e.to_string());
        Ok(())
    });
    v.validate().unwrap();

    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(v.injected_teams(), vec!["eng-west"]);
    assert_eq!(v.channels(), vec!["c1", "c2"]);
}

#[test]
fn missing_archive_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut v = Validator::new(dir.path().join("nope.zip"));
    let err = v.validate().unwrap_err();
    assert!(matches!(err, ValidateError::ArchiveOpen(_)));
    assert!(err.is_fatal());
    assert!(err.to_string().starts_with("error opening the import file"));
}

#[test]
fn non_zip_archive_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.zip");
    std::fs::write(&path, b"definitely not a zip file").unwrap();

    let mut v = Validator::new(&path);
    let errors = collect_errors(&mut v);
    let err = v.validate().unwrap_err();
    assert!(matches!(err, ValidateError::ArchiveFormat(_)));
    assert!(err.to_string().starts_with("error reading the ZIP file"));
    assert!(errors.borrow().is_empty());
}

#[test]
fn archive_without_manifest_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.zip");
    {
        use std::io::Write;
        let f = std::fs::File::create(&path).unwrap();
        let mut zw = zip::ZipWriter::new(f);
        zw.start_file("data/a.png", zip::write::FileOptions::<()>::default())
            .unwrap();
        zw.write_all(b"a").unwrap();
        zw.finish().unwrap();
    }

    let mut v = Validator::new(&path);
    assert!(matches!(v.validate(), Err(ValidateError::ManifestMissing)));
}

#[test]
fn undecompressable_attachment_is_listed_not_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_archive(
        dir.path(),
        &manifest(&[VERSION_LINE]),
        &[("data/blob.bin", "opaque bytes".as_bytes())],
    );
    // 12 is bzip2, which this build does not decompress.
    set_compression_method(&path, "data/blob.bin", 12);

    let mut v = Validator::new(&path);
    v.validate().unwrap();
    assert!(v.attachments().is_empty());
    assert_eq!(v.unused_attachments(), vec!["data/blob.bin"]);
}

#[test]
fn over_long_line_is_fatal_and_bypasses_the_policy() {
    let dir = tempfile::tempdir().unwrap();
    let long_team = format!(r#"{{"type":"team","team":{{"name":"{}"}}}}"#, "a".repeat(64));
    let path = write_archive(dir.path(), &manifest(&[VERSION_LINE, &long_team]), &[]);

    let cfg = ValidatorConfig {
        max_line_bytes: 64,
        ..ValidatorConfig::default()
    };
    let mut v = Validator::with_config(&path, cfg);
    let errors = collect_errors(&mut v);
    match v.validate() {
        Err(ValidateError::LineTooLong { line, limit }) => {
            assert_eq!(line, 2);
            assert_eq!(limit, 64);
        }
        other => panic!("expected LineTooLong, got {:?}", other),
    }
    assert!(errors.borrow().is_empty());
}
