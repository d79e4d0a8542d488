//! End-to-end resolution tests against in-memory chunks.

use modx_parser::{
    MemoryChunks, ParseError, Parser, ParserOptions, ProcessOptions, Properties, PropertyPrecedence,
    DEFAULT_MAX_NESTING,
};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

const PROCESS_ELEMENTS: &str = "Site Setting: [[++site_name]]
Nested Site Setting: [[++site_css.sepia]]
Chunk: [[$testRenderChunk]]

Nested Chunk: [[$testRenderNestedChunk]]

[[- the next line needs render data ]]
Test Arg: [[+test_arg]]
Test Not Found Tag: [[+not_found_tag]]
Test Uncacheable Tag: [[!+uncacheable_tag]]
";

fn chunks() -> MemoryChunks {
    [
        ("testRenderChunk", "MODXRenderer Test Chunk"),
        (
            "testRenderNestedChunk",
            "MODXRenderer Test Nested Chunk: [[$testRenderChunk]]",
        ),
        (
            "testChunkPropString",
            "MODXRenderer Test Chunk Prop String: [[+prop_string]][[+prop_string2]]\n",
        ),
    ]
    .into_iter()
    .collect()
}

fn site_parser() -> Parser {
    let mut parser = Parser::new(chunks());
    let store = parser.placeholders_mut();
    store.to_placeholders(
        &json!({
            "+site_name": "MODXRenderer Test Suite",
            "+site_css": {"sepia": "color sepia"}
        }),
        "",
        ".",
    );
    store.set("test_arg", "MODXRenderer Test Arg");
    parser
}

fn run(parser: &mut Parser, content: &str, uncacheable: bool, remove: bool) -> String {
    let opts = ProcessOptions::new()
        .process_uncacheable(uncacheable)
        .remove_unprocessed(remove);
    parser.process_element_tags(content, &opts).unwrap().0
}

// ============================================================================
// processElementTags variants
// ============================================================================

#[test]
fn process_elements_uncacheable_and_remove() {
    let mut parser = site_parser();
    let out = run(&mut parser, PROCESS_ELEMENTS, true, true);
    assert_eq!(
        out,
        concat!(
            "Site Setting: MODXRenderer Test Suite\n",
            "Nested Site Setting: color sepia\n",
            "Chunk: MODXRenderer Test Chunk\n",
            "\n",
            "Nested Chunk: MODXRenderer Test Nested Chunk: MODXRenderer Test Chunk\n",
            "\n",
            "\n",
            "Test Arg: MODXRenderer Test Arg\n",
            "Test Not Found Tag: \n",
            "Test Uncacheable Tag: \n",
        )
    );
}

#[test]
fn process_elements_cacheable_pass_after_full_pass_keeps_uncacheable() {
    let mut parser = site_parser();
    run(&mut parser, PROCESS_ELEMENTS, true, true);

    let out = run(&mut parser, PROCESS_ELEMENTS, false, true);
    assert!(out.contains("Test Not Found Tag: \n"));
    assert!(out.contains("Test Uncacheable Tag: [[!+uncacheable_tag]]\n"));
    assert!(out.contains("Nested Chunk: MODXRenderer Test Nested Chunk: MODXRenderer Test Chunk\n"));
}

#[test]
fn process_elements_leaves_unresolved_in_place() {
    let mut parser = site_parser();
    let out = run(&mut parser, PROCESS_ELEMENTS, false, false);
    assert_eq!(
        out,
        concat!(
            "Site Setting: MODXRenderer Test Suite\n",
            "Nested Site Setting: color sepia\n",
            "Chunk: MODXRenderer Test Chunk\n",
            "\n",
            "Nested Chunk: MODXRenderer Test Nested Chunk: MODXRenderer Test Chunk\n",
            "\n",
            "\n",
            "Test Arg: MODXRenderer Test Arg\n",
            "Test Not Found Tag: [[+not_found_tag]]\n",
            "Test Uncacheable Tag: [[!+uncacheable_tag]]\n",
        )
    );
}

#[test]
fn uncacheable_removed_when_no_uncacheable_pass_ran() {
    let mut parser = site_parser();
    let out = run(&mut parser, "[[!+uncacheable_tag]]|[[+test_arg]]", false, true);
    assert_eq!(out, "|MODXRenderer Test Arg");
}

#[test]
fn uncacheable_resolved_when_allowed() {
    let mut parser = site_parser();
    parser.placeholders_mut().set("uncacheable_tag", "fresh");
    assert_eq!(run(&mut parser, "[[!+uncacheable_tag]]", true, false), "fresh");
    assert_eq!(run(&mut parser, "[[!+uncacheable_tag]]", false, false), "[[!+uncacheable_tag]]");
}

#[test]
fn uncacheable_inside_chunk_resolves_on_later_pass() {
    let chunks: MemoryChunks = [("live", "now: [[!+clock]]")].into_iter().collect();
    let mut parser = Parser::new(chunks);
    parser.placeholders_mut().set("clock", "12:00");
    assert_eq!(parser.process("[[$live]]").unwrap(), "now: 12:00");
}

#[test]
fn processed_count_sums_passes() {
    let mut parser = site_parser();
    let opts = ProcessOptions::new().process_uncacheable(true).max_depth(10);
    let (out, count) = parser
        .process_element_tags("[[+test_arg]] [[$testRenderChunk]] [[+missing]]", &opts)
        .unwrap();
    assert_eq!(out, "MODXRenderer Test Arg MODXRenderer Test Chunk [[+missing]]");
    assert_eq!(count, 2);
}

#[test]
fn no_delimiters_is_identity() {
    let mut parser = site_parser();
    let (out, count) = parser
        .process_element_tags("just ] text [ here", &ProcessOptions::new().remove_unprocessed(true))
        .unwrap();
    assert_eq!(out, "just ] text [ here");
    assert_eq!(count, 0);
}

#[test]
fn custom_delimiters_per_call() {
    let mut parser = site_parser();
    let opts = ProcessOptions::new().prefix("{{").suffix("}}");
    let (out, _) = parser
        .process_element_tags("{{+test_arg}} [[+test_arg]]", &opts)
        .unwrap();
    assert_eq!(out, "MODXRenderer Test Arg [[+test_arg]]");
}

// ============================================================================
// Chunks and properties
// ============================================================================

#[test]
fn get_chunk_with_property_map() {
    let mut parser = site_parser();
    let props = Properties::from(&json!({
        "prop_string": "testing getChunk",
        "prop_string2": "prop string with amp; in key"
    }));
    let out = parser.get_chunk("testChunkPropString", props).unwrap();
    assert_eq!(
        out,
        "MODXRenderer Test Chunk Prop String: testing getChunkprop string with amp; in key\n"
    );
}

#[test]
fn chunk_prop_string_with_nested_tag_and_amp_key() {
    let mut parser = site_parser();
    let out = parser
        .process(
            "Chunk with prop string: [[$testChunkPropString? &prop_string=`[[++site_name]]` &amp;prop_string2=`prop string with amp value`]]",
        )
        .unwrap();
    assert_eq!(
        out.trim(),
        "Chunk with prop string: MODXRenderer Test Chunk Prop String: MODXRenderer Test Suiteprop string with amp value"
    );
}

#[test]
fn chunk_properties_are_scoped_to_the_chunk() {
    let chunks: MemoryChunks = [("c", "[[+p]]")].into_iter().collect();
    let mut parser = Parser::new(chunks);
    let out = parser.process("[[$c? &p=`inside`]]/[[+p]]").unwrap();
    assert_eq!(out, "inside/[[+p]]");
    assert!(!parser.placeholders().contains_key("p"));
}

#[test]
fn same_chunk_with_different_properties() {
    let chunks: MemoryChunks = [("li", "<li>[[+item]]</li>")].into_iter().collect();
    let mut parser = Parser::new(chunks);
    let out = parser
        .process("[[$li? &item=`one`]][[$li? &item=`two`]]")
        .unwrap();
    assert_eq!(out, "<li>one</li><li>two</li>");
}

#[test]
fn store_wins_by_default() {
    let chunks: MemoryChunks = [("card", "[[+title]]")].into_iter().collect();
    let mut parser = Parser::new(chunks);
    parser.placeholders_mut().set("title", "from store");
    assert_eq!(parser.process("[[$card? &title=`explicit`]]").unwrap(), "from store");
    assert_eq!(parser.placeholders().get_str("title").as_deref(), Some("from store"));
}

#[test]
fn explicit_wins_when_configured() {
    let chunks: MemoryChunks = [("card", "[[+title]]")].into_iter().collect();
    let options = ParserOptions {
        precedence: PropertyPrecedence::ExplicitWins,
        ..ParserOptions::default()
    };
    let mut parser = Parser::with_options(chunks, options);
    parser.placeholders_mut().set("title", "from store");
    assert_eq!(parser.process("[[$card? &title=`explicit`]]").unwrap(), "explicit");
    assert_eq!(parser.placeholders().get_str("title").as_deref(), Some("from store"));
}

#[test]
fn placeholder_values_are_resolved_too() {
    let mut parser = Parser::new(MemoryChunks::new());
    parser.placeholders_mut().set("greeting", "Hello [[+name]]");
    parser.placeholders_mut().set("name", "Ada");
    assert_eq!(parser.process("[[+greeting]]").unwrap(), "Hello Ada");
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn conditional_filter_chain() {
    let mut parser = Parser::new(MemoryChunks::new());
    parser.placeholders_mut().set("a", "a");
    parser.placeholders_mut().set("b", "b");
    let out = parser
        .process("[[+a:is=`a`:then=`yes`:else=`no`]] [[+b:is=`a`:then=`yes`:else=`no`]]")
        .unwrap();
    assert_eq!(out, "yes no");
}

#[test]
fn filters_on_missing_placeholder() {
    let mut parser = Parser::new(MemoryChunks::new());
    parser.placeholders_mut().set("isempty", "");
    parser.placeholders_mut().set("notempty", " ");
    let out = parser
        .process("[[+missing:default=`none`]]|[[+isempty:default=`empty`]]|[[+notempty:notempty=`set`]]")
        .unwrap();
    assert_eq!(out, "none|empty|set");
}

#[test]
fn filter_argument_can_hold_a_tag() {
    let mut parser = Parser::new(MemoryChunks::new());
    parser.placeholders_mut().set("fallback", "from fallback");
    assert_eq!(
        parser.process("[[+missing:default=`[[+fallback]]`]]").unwrap(),
        "from fallback"
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn missing_chunk_fails_the_whole_resolution() {
    let mut parser = site_parser();
    let err = parser.process("ok [[$nowhere]]").unwrap_err();
    assert!(matches!(err, ParseError::ChunkNotFound { ref name, .. } if name == "nowhere"));
}

#[test]
fn indirect_cycle_is_reported() {
    let chunks: MemoryChunks = [("a", "[[$b]]"), ("b", "[[$c]]"), ("c", "[[$a]]")]
        .into_iter()
        .collect();
    let mut parser = Parser::new(chunks);
    match parser.process("[[$a]]") {
        Err(ParseError::CyclicReference { tag, chain }) => {
            assert_eq!(tag, "[[$a]]");
            assert_eq!(chain, vec!["[[$a]]", "[[$b]]", "[[$c]]"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

fn growing_chunk_parser(max_nesting: Option<usize>) -> Parser {
    let chunks: MemoryChunks = [("a", "[[$a? &d=`[[+d]]x`]]")].into_iter().collect();
    let mut options = ParserOptions {
        precedence: PropertyPrecedence::ExplicitWins,
        ..ParserOptions::default()
    };
    if let Some(limit) = max_nesting {
        options.max_nesting = limit;
    }
    Parser::with_options(chunks, options)
}

#[test]
fn chunk_growing_its_own_properties_hits_nesting_limit() {
    let mut parser = growing_chunk_parser(Some(8));
    match parser.process("[[$a? &d=`1`]]") {
        Err(ParseError::NestingTooDeep { tag, limit }) => {
            assert_eq!(limit, 8);
            assert!(tag.starts_with("[["));
        }
        other => panic!("expected nesting error, got {other:?}"),
    }
    assert!(!parser.placeholders().contains_key("d"));
}

#[test]
fn default_nesting_limit_fails_before_the_stack_does() {
    let handle = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| growing_chunk_parser(None).process("[[$a? &d=`1`]]"))
        .unwrap();
    match handle.join().unwrap() {
        Err(ParseError::NestingTooDeep { limit, .. }) => assert_eq!(limit, DEFAULT_MAX_NESTING),
        other => panic!("expected nesting error, got {other:?}"),
    }
}

#[test]
fn idempotent_for_identical_inputs() {
    let first = site_parser().process(PROCESS_ELEMENTS).unwrap();
    let second = site_parser().process(PROCESS_ELEMENTS).unwrap();
    assert_eq!(first, second);
}
