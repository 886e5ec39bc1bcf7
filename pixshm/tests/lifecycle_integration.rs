//! Region lifecycle tests: create, attach, validation and typed views.

use pixshm::platform::{OpenMode, object_name, open_object, resize_object};
use pixshm::{
    ComplexF32, ComplexF64, ElementType, HEADER_SIZE, Half, Keyword, KeywordValue, Region,
    Sample, SchemaField, ShmError, ShmResult, SizeField, operator,
};

fn unique(tag: &str) -> String {
    format!("lifecycle_{}_{}", tag, std::process::id())
}

fn frame_schema(exptime: f64, frame_id: i64) -> Vec<Keyword> {
    vec![
        Keyword::new("EXPTIME", exptime, "exposure time"),
        Keyword::new("FRAMEID", frame_id, "frame counter"),
        Keyword::new("FILTER", "R", "filter"),
    ]
}

#[test]
fn test_create_attach_round_trip() -> ShmResult<()> {
    let name = unique("round_trip");
    let mut producer = Region::create(&name, 16, ElementType::Uint16, &frame_schema(0.25, 7))?;
    for (i, s) in producer.samples_as_mut::<u16>().unwrap().iter_mut().enumerate() {
        *s = i as u16 * 3;
    }

    let consumer = Region::attach(&name)?;
    assert_eq!(consumer.size(), producer.size());
    assert_eq!(consumer.layout(), producer.layout());
    assert_eq!(consumer.element_type(), Some(ElementType::Uint16));
    assert_eq!(consumer.keyword_count(), 3);
    assert_eq!(consumer.keywords(), producer.keywords());
    assert_eq!(consumer.samples_as::<u16>().unwrap()[5], 15);
    assert_eq!(
        consumer.find_keyword("FILTER").unwrap().value(),
        Some(KeywordValue::Text("R".to_string()))
    );

    drop(consumer);
    producer.close();
    operator::remove(&name)
}

#[test]
fn test_create_twice_fails() -> ShmResult<()> {
    let name = unique("twice");
    let region = Region::create(&name, 1, ElementType::Uint8, &[])?;
    assert!(matches!(
        Region::create(&name, 1, ElementType::Uint8, &[]),
        Err(ShmError::AlreadyExists { .. })
    ));
    region.close();
    operator::remove(&name)
}

#[test]
fn test_attach_missing() {
    let name = unique("missing");
    assert!(!Region::exists(&name));
    assert!(matches!(Region::attach(&name), Err(ShmError::NotFound { .. })));
    assert!(matches!(
        Region::attach_and_validate(&name, 1, ElementType::Uint8, &[]),
        Err(ShmError::NotFound { .. })
    ));
}

/// Create and size a backing object without initializing a header in it.
fn raw_object(name: &str, len: usize) -> ShmResult<()> {
    let path = object_name(name)?;
    let file = open_object(name, &path, OpenMode::CreateNew)?;
    resize_object(name, &file, len)
}

#[test]
fn test_attach_rejects_uninitialized_header() -> ShmResult<()> {
    let name = unique("uninit");
    raw_object(&name, HEADER_SIZE + 64)?;

    assert!(matches!(Region::attach(&name), Err(ShmError::Uninitialized { .. })));
    assert!(matches!(
        Region::attach_and_validate(&name, 0, ElementType::Uint8, &[]),
        Err(ShmError::SizeMismatch { field: SizeField::Bytes, .. })
    ));
    assert!(matches!(
        Region::attach_and_validate(&name, 64, ElementType::Uint8, &[]),
        Err(ShmError::Uninitialized { .. })
    ));
    operator::remove(&name)
}

#[test]
fn test_attach_rejects_object_smaller_than_header() -> ShmResult<()> {
    let name = unique("short");
    raw_object(&name, HEADER_SIZE - 8)?;

    match Region::attach(&name) {
        Err(ShmError::SizeMismatch { field, expected, actual, .. }) => {
            assert_eq!(field, SizeField::Bytes);
            assert_eq!(expected, HEADER_SIZE);
            assert_eq!(actual, HEADER_SIZE - 8);
        }
        other => panic!("Expected SizeMismatch, got: {:?}", other),
    }
    operator::remove(&name)
}

#[test]
fn test_attach_rejects_truncated_region() -> ShmResult<()> {
    let name = unique("truncated");
    let region = Region::create(&name, 16, ElementType::Uint32, &frame_schema(1.0, 1))?;
    let full = region.size();
    region.close();

    let path = object_name(&name)?;
    let file = open_object(&name, &path, OpenMode::Existing)?;
    resize_object(&name, &file, full - 4)?;

    match Region::attach(&name) {
        Err(ShmError::SizeMismatch { field, expected, actual, .. }) => {
            assert_eq!(field, SizeField::Bytes);
            assert_eq!(expected, full);
            assert_eq!(actual, full - 4);
        }
        other => panic!("Expected SizeMismatch, got: {:?}", other),
    }
    operator::remove(&name)
}

#[test]
fn test_close_keeps_name() -> ShmResult<()> {
    let name = unique("close");
    let region = Region::create(&name, 2, ElementType::Int8, &[])?;
    region.close();
    assert!(Region::exists(&name));
    assert_eq!(Region::attach(&name)?.sample_count(), 2);
    operator::remove(&name)
}

#[test]
fn test_invalid_names() {
    assert!(matches!(
        Region::create("", 1, ElementType::Uint8, &[]),
        Err(ShmError::InvalidName { .. })
    ));
    assert!(matches!(Region::attach("a/b"), Err(ShmError::InvalidName { .. })));
    assert!(!Region::exists(""));
}

#[test]
fn test_end_to_end_frame() -> ShmResult<()> {
    let name = unique("frame0");
    let schema = [
        Keyword::new("EXPTIME", 1.5, ""),
        Keyword::new("FRAMEID", 42, ""),
    ];
    let mut region = Region::create(&name, 100, ElementType::Float, &schema)?;
    assert_eq!(region.samples_as::<f32>().map(|s| s.len()), Some(100));
    region.samples_as_mut::<f32>().unwrap()[99] = 2.5;
    region.close();

    let region = Region::attach(&name)?;
    assert_eq!(region.find_keyword("EXPTIME").unwrap().as_float(), Some(1.5));
    assert_eq!(region.find_keyword("FRAMEID").unwrap().as_integer(), Some(42));
    assert_eq!(region.samples_as::<f32>().unwrap()[99], 2.5);
    assert!(region.find_keyword("GAIN").is_none());
    region.close();
    operator::remove(&name)
}

#[test]
fn test_attach_and_validate_refreshes_values() -> ShmResult<()> {
    let name = unique("refresh");
    let producer = Region::create(&name, 8, ElementType::Double, &frame_schema(1.0, 1))?;

    let updated = Region::attach_and_validate(&name, 8, ElementType::Double, &frame_schema(2.0, 99))?;
    assert_eq!(updated.find_keyword("EXPTIME").unwrap().as_float(), Some(2.0));
    assert_eq!(updated.find_keyword("FRAMEID").unwrap().as_integer(), Some(99));

    // Same mapping seen from the first handle.
    assert_eq!(producer.find_keyword("FRAMEID").unwrap().as_integer(), Some(99));

    drop(updated);
    producer.close();
    operator::remove(&name)
}

#[test]
fn test_attach_and_validate_schema_mismatch() -> ShmResult<()> {
    let name = unique("schema");
    let region = Region::create(&name, 4, ElementType::Int32, &frame_schema(1.0, 1))?;

    let mut renamed = frame_schema(1.0, 1);
    renamed[1] = Keyword::new("FRAMENO", 1, "frame counter");
    assert!(matches!(
        Region::attach_and_validate(&name, 4, ElementType::Int32, &renamed),
        Err(ShmError::SchemaMismatch { index: 1, field: SchemaField::Name, .. })
    ));

    let mut recommented = frame_schema(1.0, 1);
    recommented[0] = Keyword::new("EXPTIME", 1.0, "exposure [ms]");
    assert!(matches!(
        Region::attach_and_validate(&name, 4, ElementType::Int32, &recommented),
        Err(ShmError::SchemaMismatch { index: 0, field: SchemaField::Comment, .. })
    ));

    let mut retyped = frame_schema(1.0, 1);
    retyped[2] = Keyword::new("FILTER", 3, "filter");
    assert!(matches!(
        Region::attach_and_validate(&name, 4, ElementType::Int32, &retyped),
        Err(ShmError::SchemaMismatch { index: 2, field: SchemaField::Kind, .. })
    ));

    // Nothing was overwritten by the rejected attempts.
    assert_eq!(region.find_keyword("FRAMEID").unwrap().as_integer(), Some(1));

    region.close();
    operator::remove(&name)
}

#[test]
fn test_attach_and_validate_size_mismatch() -> ShmResult<()> {
    let name = unique("size");
    let region = Region::create(&name, 10, ElementType::Uint16, &frame_schema(1.0, 1))?;

    assert!(matches!(
        Region::attach_and_validate(&name, 11, ElementType::Uint16, &frame_schema(1.0, 1)),
        Err(ShmError::SizeMismatch { .. })
    ));
    assert!(matches!(
        Region::attach_and_validate(&name, 10, ElementType::Uint32, &frame_schema(1.0, 1)),
        Err(ShmError::SizeMismatch { .. })
    ));
    assert!(matches!(
        Region::attach_and_validate(&name, 10, ElementType::Uint16, &frame_schema(1.0, 1)[..2]),
        Err(ShmError::SizeMismatch { .. })
    ));
    // Same byte size, different element type.
    match Region::attach_and_validate(&name, 10, ElementType::Int16, &frame_schema(1.0, 1)) {
        Err(ShmError::SizeMismatch { field, expected, actual, .. }) => {
            assert_eq!(field, SizeField::ElementTag);
            assert_eq!(expected, usize::from(ElementType::Int16.tag()));
            assert_eq!(actual, usize::from(ElementType::Uint16.tag()));
        }
        other => panic!("Expected SizeMismatch, got: {:?}", other),
    }

    region.close();
    operator::remove(&name)
}

#[test]
fn test_open_or_create_reuses_region() -> ShmResult<()> {
    let name = unique("reuse");
    let first = Region::open_or_create(&name, 32, ElementType::Uint8, &frame_schema(1.0, 1))?;
    let created = first.created_at();

    let second = Region::open_or_create(&name, 32, ElementType::Uint8, &frame_schema(3.0, 2))?;
    assert_eq!(second.created_at(), created);
    assert_eq!(first.find_keyword("EXPTIME").unwrap().as_float(), Some(3.0));

    assert!(matches!(
        Region::open_or_create(&name, 64, ElementType::Uint8, &frame_schema(3.0, 2)),
        Err(ShmError::SizeMismatch { .. })
    ));

    drop(second);
    first.close();
    operator::remove(&name)
}

#[test]
fn test_info_reports_state() -> ShmResult<()> {
    let name = unique("info");
    let region = Region::create(&name, 3, ElementType::ComplexDouble, &frame_schema(1.0, 1))?;
    region.consumer_request_start()?;

    let info = region.info()?;
    assert_eq!(info.name, name);
    assert_eq!(info.size, region.size());
    assert_eq!(info.sample_count, 3);
    assert_eq!(info.element_type, Some(ElementType::ComplexDouble));
    assert!(info.request_pending);
    assert!(!info.frame_ready);
    assert!(info.to_json_pretty()?.contains("\"complex_double\""));

    region.close();
    operator::remove(&name)
}

#[test]
fn test_reset_creation_time() -> ShmResult<()> {
    let name = unique("ctime");
    let region = Region::create(&name, 1, ElementType::Uint8, &[])?;
    let before = region.created_at();
    std::thread::sleep(std::time::Duration::from_millis(5));
    region.reset_creation_time()?;
    assert!(region.created_at() > before);
    assert!(region.last_accessed() >= before);
    region.close();
    operator::remove(&name)
}

fn view_matches<T: Sample>(region: &Region) -> bool {
    region.samples_as::<T>().is_some()
}

#[test]
fn test_sample_view_requires_matching_type() -> ShmResult<()> {
    let views: [(ElementType, fn(&Region) -> bool); 13] = [
        (ElementType::Uint8, view_matches::<u8>),
        (ElementType::Int8, view_matches::<i8>),
        (ElementType::Uint16, view_matches::<u16>),
        (ElementType::Int16, view_matches::<i16>),
        (ElementType::Uint32, view_matches::<u32>),
        (ElementType::Int32, view_matches::<i32>),
        (ElementType::Uint64, view_matches::<u64>),
        (ElementType::Int64, view_matches::<i64>),
        (ElementType::Float, view_matches::<f32>),
        (ElementType::Double, view_matches::<f64>),
        (ElementType::ComplexFloat, view_matches::<ComplexF32>),
        (ElementType::ComplexDouble, view_matches::<ComplexF64>),
        (ElementType::Half, view_matches::<Half>),
    ];

    for stored in ElementType::ALL {
        let name = unique(&format!("view_{}", stored.tag()));
        let region = Region::create(&name, 4, stored, &[])?;
        assert_eq!(region.sample_bytes().len(), 4 * stored.width());
        for (requested, view) in &views {
            assert_eq!(
                view(&region),
                *requested == stored,
                "stored {} requested {}",
                stored,
                requested
            );
        }
        region.close();
        operator::remove(&name)?;
    }
    Ok(())
}
