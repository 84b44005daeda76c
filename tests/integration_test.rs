//! End-to-end tests driving the public `tsdl::parse` entry point over
//! complete metadata documents.

use tsdl::{ByteOrder, ParseErrorKind, Type};

const PREFIX: &str = r#"
    trace { major = 1; minor = 8; byte_order = le; };
    clock { name = mono; freq = 1000000000; };
"#;

#[test]
fn minimal_valid_trace_parses() {
    let src = format!("{PREFIX}\nstream {{ id = 0; }};");
    let doc = tsdl::parse(&src).unwrap();
    let trace = doc.trace.as_ref().unwrap();
    assert_eq!(trace.major, 1);
    assert_eq!(trace.byte_order, ByteOrder::LittleEndian);
    assert_eq!(doc.clocks.len(), 1);
    assert_eq!(doc.streams.len(), 1);
}

#[test]
fn trace_and_env_are_none_when_absent() {
    let src = r#"
        clock { name = mono; freq = 1000000000; };
        stream { id = 0; };
    "#;
    let doc = tsdl::parse(src).unwrap();
    assert!(doc.trace.is_none());
    assert!(doc.env.is_none());
}

#[test]
fn typealias_and_inline_struct_field_via_type_assignment() {
    let src = format!(
        "typealias integer {{ size = 32; }} := uint32_t;\n\
         {PREFIX}\n\
         trace {{ major = 1; minor = 8; byte_order = le; \
            packet.header := struct {{ uint32_t magic; }}; }};\n\
         stream {{ id = 0; }};"
    );
    let doc = tsdl::parse(&src).unwrap();
    match doc.trace.unwrap().packet_header {
        Some(Type::Struct(s)) => {
            assert_eq!(s.fields.len(), 1);
            assert_eq!(s.fields[0].name, "magic");
            assert!(matches!(s.fields[0].type_node, Type::Integer(_)));
        }
        _ => panic!("expected a struct packet_header"),
    }
}

#[test]
fn array_of_array_field() {
    let src = format!(
        "{PREFIX}\n\
         stream {{ id = 0; }};\n\
         event {{ id = 0; name = grid; stream_id = 0; \
            fields := struct {{ integer {{ size = 8; }} cell[4][4]; }}; }};"
    );
    let doc = tsdl::parse(&src).unwrap();
    let stream = &doc.streams[&0];
    let event = stream.event_by_id(0).unwrap();
    match event.fields.as_ref().unwrap() {
        Type::Struct(s) => match &s.fields[0].type_node {
            Type::Array { base, size: 4 } => {
                assert!(matches!(**base, Type::Array { size: 4, .. }));
            }
            other => panic!("expected outer array, got {other:?}"),
        },
        other => panic!("expected struct fields, got {other:?}"),
    }
}

#[test]
fn sequence_with_dotted_length_path() {
    let src = format!(
        "{PREFIX}\n\
         stream {{ id = 0; }};\n\
         event {{ id = 0; name = blob; stream_id = 0; \
            fields := struct {{ \
                integer {{ size = 16; }} len; \
                integer {{ size = 8; }} data[len]; \
            }}; }};"
    );
    let doc = tsdl::parse(&src).unwrap();
    let event = doc.streams[&0].event_by_name("blob").unwrap();
    match event.fields.as_ref().unwrap() {
        Type::Struct(s) => match &s.fields[1].type_node {
            Type::Sequence { length_path, .. } => {
                assert_eq!(length_path, &vec!["len".to_string()])
            }
            other => panic!("expected a sequence, got {other:?}"),
        },
        other => panic!("expected struct fields, got {other:?}"),
    }
}

#[test]
fn enum_with_range_and_auto_increment_sequencing() {
    let src = format!(
        "typealias enum : integer {{ size = 8; }} \
            {{ RED, GREEN = 5, RESERVED = 10...12, BLUE }} := color;\n\
         {PREFIX}\n\
         stream {{ id = 0; }};\n\
         event {{ id = 0; name = paint; stream_id = 0; fields := struct {{ color c; }}; }};"
    );
    let doc = tsdl::parse(&src).unwrap();
    let event = doc.streams[&0].event_by_name("paint").unwrap();
    match event.fields.as_ref().unwrap() {
        Type::Struct(s) => match &s.fields[0].type_node {
            Type::Enum(e) => {
                let labels: Vec<_> = e.enumerators.iter().map(|en| en.label.as_str()).collect();
                assert_eq!(labels, vec!["RED", "GREEN", "RESERVED", "BLUE"]);
                assert_eq!((e.enumerators[0].low, e.enumerators[0].high), (0, 0));
                assert_eq!((e.enumerators[1].low, e.enumerators[1].high), (5, 5));
                assert_eq!((e.enumerators[2].low, e.enumerators[2].high), (10, 12));
                assert_eq!((e.enumerators[3].low, e.enumerators[3].high), (13, 13));
            }
            other => panic!("expected an enum, got {other:?}"),
        },
        other => panic!("expected struct fields, got {other:?}"),
    }
}

#[test]
fn duplicate_event_id_in_same_stream_is_an_error() {
    let src = format!(
        "{PREFIX}\n\
         stream {{ id = 0; }};\n\
         event {{ id = 1; name = a; stream_id = 0; }};\n\
         event {{ id = 1; name = b; stream_id = 0; }};"
    );
    let err = tsdl::parse(&src).unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::DuplicateEvent { stream_id: 0, .. }));
}

#[test]
fn duplicate_event_name_in_same_stream_is_an_error() {
    let src = format!(
        "{PREFIX}\n\
         stream {{ id = 0; }};\n\
         event {{ id = 1; name = a; stream_id = 0; }};\n\
         event {{ id = 2; name = a; stream_id = 0; }};"
    );
    let err = tsdl::parse(&src).unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::DuplicateEvent { stream_id: 0, .. }));
}

#[test]
fn get_ast_only_runs_grammar_recognition() {
    let ast = tsdl::get_ast("trace { major = 1; minor = 8; byte_order = le; };").unwrap();
    assert_eq!(ast.items.len(), 1);
}
