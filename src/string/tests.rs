//! Arena string tests
//!
//! Organized by component:
//! - Construction and copies
//! - Concatenation and tip-adjacency
//! - C string interop
//! - Pure operations (compare, slice, trim, hash)
//! - Split iterators

use super::*;
use crate::format_in;
use std::collections::HashSet;

fn arena() -> Arena {
    Arena::with_capacity(1 << 16).expect("arena")
}

// ===== Construction =====

#[test]
fn literal_view_is_copied_on_clone() {
    let arena = arena();
    let s = Str::lit("static");
    let copy = s.clone_in(&arena).expect("clone");

    assert_eq!(s, "static");
    assert_eq!(copy, s);
    assert_ne!(copy.as_bytes().as_ptr(), s.as_bytes().as_ptr());
    assert_eq!(arena.used(), 6);
}

#[test]
fn clone_at_tip_is_free() {
    let arena = arena();
    let s = arena.alloc_str("tip").expect("alloc");
    assert!(s.is_at_tip(&arena));

    let used = arena.used();
    let same = s.clone_in(&arena).expect("clone");
    assert_eq!(same.as_bytes().as_ptr(), s.as_bytes().as_ptr());
    assert_eq!(arena.used(), used);
}

#[test]
fn empty_strings_never_allocate() {
    let arena = arena();
    let empty = arena.alloc_str("").expect("alloc");
    assert!(empty.is_empty());
    assert!(Str::empty().clone_in(&arena).expect("clone").is_empty());
    assert_eq!(arena.used(), 0);
    assert_eq!(Str::default(), "");
}

#[test]
fn alloc_bytes_copies_binary_data() {
    let arena = arena();
    let s = arena.alloc_bytes(&[0, 159, 146, 150]).expect("alloc");
    assert_eq!(s.len(), 4);
    assert!(s.to_str().is_none());
    assert_eq!(format!("{}", s), "\0\u{FFFD}\u{FFFD}\u{FFFD}");
}

#[test]
fn format_allocates_exact_length() {
    let arena = arena();
    let s = format_in!(arena, "{}-{:03}", "item", 7).expect("format");

    assert_eq!(s, "item-007");
    assert_eq!(arena.used(), 8);
    assert!(s.is_at_tip(&arena));
}

#[test]
fn format_without_arguments() {
    let arena = arena();
    let s = arena.format(format_args!("plain")).expect("format");
    assert_eq!(s, "plain");
}

#[test]
fn format_exhaustion_in_recover_scope() {
    let arena = Arena::with_capacity(8).expect("arena");
    let result = arena.recover(|a| format_in!(a, "{}", "far too long for eight bytes").map(|s| s.len()));
    assert!(result.is_err());
    assert_eq!(arena.used(), 0);
}

// ===== Concatenation =====

#[test]
fn concat_round_trip() {
    let arena = arena();
    let a = Str::lit("foo");
    let b = Str::lit("bar");

    let ab = a.concat(&arena, b).expect("concat");
    assert_eq!(ab, "foobar");
    assert_eq!(ab.substr(0, a.len()), a);
    assert_eq!(ab.substr(a.len(), usize::MAX), b);
}

#[test]
fn concat_at_tip_extends_in_place() {
    let arena = arena();
    let head = arena.alloc_str("head").expect("alloc");
    let start = head.as_bytes().as_ptr();

    let joined = head.concat(&arena, Str::lit("+tail")).expect("concat");
    assert_eq!(joined.as_bytes().as_ptr(), start);
    assert_eq!(joined, "head+tail");
    assert_eq!(arena.used(), 9);
}

#[test]
fn concat_not_at_tip_copies_head() {
    let arena = arena();
    let head = arena.alloc_str("head").expect("alloc");
    arena.alloc_str("other").expect("alloc");

    let joined = head.concat(&arena, Str::lit("!")).expect("concat");
    assert_ne!(joined.as_bytes().as_ptr(), head.as_bytes().as_ptr());
    assert_eq!(joined, "head!");
    assert_eq!(head, "head");
}

#[test]
fn concat_with_empty_operands() {
    let arena = arena();
    let s = arena.alloc_str("x").expect("alloc");

    assert_eq!(Str::empty().concat(&arena, s).expect("concat"), "x");
    assert_eq!(s.concat(&arena, Str::empty()).expect("concat"), "x");
    assert_eq!(arena.used(), 1);
}

#[test]
fn concat_with_itself() {
    let arena = arena();
    let s = arena.alloc_str("ab").expect("alloc");

    let twice = s.concat(&arena, s).expect("concat");
    assert_eq!(twice, "abab");

    let four = twice.concat(&arena, twice).expect("concat");
    assert_eq!(four, "abababab");
}

#[test]
fn building_a_string_piecewise() {
    let arena = arena();
    let mut s = Str::empty();
    for word in ["alpha", " ", "beta", " ", "gamma"] {
        s = s.cat_str(&arena, word).expect("cat");
    }

    assert_eq!(s, "alpha beta gamma");
    // Every piece after the first extended in place
    assert_eq!(arena.used(), s.len());
}

#[test]
fn cat_bytes_accepts_short_lived_tail() {
    let arena = arena();
    let head = arena.alloc_str("id=").expect("alloc");
    let s = {
        let tail = 42.to_string();
        head.cat_bytes(&arena, tail.as_bytes()).expect("cat")
    };
    assert_eq!(s, "id=42");
}

// ===== C strings =====

#[test]
fn with_cstr_reclaims_space() {
    let arena = arena();
    let s = arena.alloc_str("path/to/file").expect("alloc");
    let used = arena.used();

    let len = s
        .with_cstr(&arena, |c| {
            assert_eq!(c.to_bytes(), b"path/to/file");
            c.to_bytes_with_nul().len()
        })
        .expect("cstr");

    assert_eq!(len, 13);
    assert_eq!(arena.used(), used);
}

#[test]
fn with_cstr_keeps_space_when_region_moved() {
    let arena = arena();
    let s = arena.alloc_str("name").expect("alloc");
    arena.alloc_str("spacer").expect("alloc");
    let used = arena.used();

    s.with_cstr(&arena, |c| {
        assert_eq!(c.to_bytes(), b"name");
        arena.alloc_str("inner").expect("alloc");
    })
    .expect("cstr");

    assert_eq!(arena.used(), used + 5 + 5);
}

#[test]
fn with_cstr_truncates_at_interior_nul() {
    let arena = arena();
    let s = Str::new(b"abc\0def");
    let seen = s.with_cstr(&arena, |c| c.to_bytes().to_vec()).expect("cstr");
    assert_eq!(seen, b"abc");
}

#[test]
fn with_cstr_on_empty_string() {
    let arena = arena();
    let n = Str::empty().with_cstr(&arena, |c| c.to_bytes().len()).expect("cstr");
    assert_eq!(n, 0);
    assert_eq!(arena.used(), 0);
}

#[test]
fn to_cstring_is_heap_owned() {
    let owned = Str::new(b"hello\0world").to_cstring();
    assert_eq!(owned.as_bytes(), b"hello");
    assert_eq!(Str::lit("plain").to_cstring().as_bytes(), b"plain");
}

// ===== Pure operations =====

#[test]
fn prefix_and_suffix() {
    let s = Str::lit("region.toml");
    assert!(s.starts_with("region"));
    assert!(s.ends_with(b".toml"));
    assert!(s.starts_with(Str::lit("")));
    assert!(!s.ends_with("region.toml.bak"));
}

#[test]
fn substr_clamps_length() {
    let s = Str::lit("abcdef");
    assert_eq!(s.substr(2, 3), "cde");
    assert_eq!(s.substr(4, 100), "ef");
    assert_eq!(s.substr(6, 1), "");
}

#[test]
#[should_panic(expected = "out of range")]
fn substr_past_end_panics() {
    let _ = Str::lit("abc").substr(4, 1);
}

#[test]
fn slice_by_positions() {
    let s = Str::lit("abcdef");
    assert_eq!(s.slice(1, 4), "bcd");
    assert_eq!(s.slice(3, 100), "def");
    assert_eq!(s.slice(2, 2), "");
}

#[test]
#[should_panic(expected = "invalid slice")]
fn inverted_slice_panics() {
    let _ = Str::lit("abcdef").slice(4, 1);
}

#[test]
fn trimming() {
    let s = Str::lit(" \t\r\n value \n");
    assert_eq!(s.trim_left(), "value \n");
    assert_eq!(s.trim_right(), " \t\r\n value");
    assert_eq!(s.trim(), "value");
    assert_eq!(Str::lit("   ").trim(), "");
    // Control bytes count as whitespace
    assert_eq!(Str::new(b"\x01x\x1f").trim(), "x");
}

#[test]
fn fnv1a_hash() {
    assert_eq!(Str::empty().hash64(), 0xcbf2_9ce4_8422_2325);
    assert_eq!(Str::lit("a").hash64(), 0xaf63_dc4c_8601_ec8c);
    assert_eq!(Str::lit("foobar").hash64(), 0x85944171f73967e8);
}

#[test]
fn equal_strings_hash_equal() {
    let arena = arena();
    let copy = arena.alloc_str("key").expect("alloc");

    let mut set = HashSet::new();
    set.insert(Str::lit("key"));
    assert!(set.contains(&copy));
    assert_eq!(copy.hash64(), Str::lit("key").hash64());
}

#[test]
fn debug_is_quoted() {
    assert_eq!(format!("{:?}", Str::lit("a\"b")), "\"a\\\"b\"");
    assert_eq!(Str::lit("x").to_string(), "x");
}

// ===== Split =====

#[test]
fn split_keeps_empty_fields() {
    let fields: Vec<_> = Str::lit("a,bb,,c").split(b",").collect();
    assert_eq!(fields, ["a", "bb", "", "c"]);
}

#[test]
fn split_with_multibyte_separator() {
    let fields: Vec<_> = Str::lit("one::two::three").split(b"::").collect();
    assert_eq!(fields, ["one", "two", "three"]);
}

#[test]
fn split_edge_cases() {
    assert_eq!(Str::lit("").split(b",").count(), 0);
    assert_eq!(Str::lit("abc").split(b",").collect::<Vec<_>>(), ["abc"]);
    assert_eq!(Str::lit(",a").split(b",").collect::<Vec<_>>(), ["", "a"]);
    // Trailing separator yields no trailing empty field
    assert_eq!(Str::lit("a,").split(b",").collect::<Vec<_>>(), ["a"]);
    assert_eq!(Str::lit(",").split(b",").collect::<Vec<_>>(), [""]);
}

#[test]
fn split_is_restartable() {
    let split = Str::lit("x;y").split(b";");
    let first: Vec<_> = split.clone().collect();
    let second: Vec<_> = split.collect();
    assert_eq!(first, second);
}

#[test]
fn split_any_collapses_separator_runs() {
    let tokens: Vec<_> = Str::lit("a, b;c").split_any(b" ,;").collect();
    assert_eq!(tokens, ["a", "b", "c"]);
}

#[test]
fn split_any_edge_cases() {
    assert_eq!(Str::lit("").split_any(b" ").count(), 0);
    assert_eq!(Str::lit("  lead").split_any(b" ").collect::<Vec<_>>(), ["", "lead"]);
    assert_eq!(Str::lit("trail  ").split_any(b" ").collect::<Vec<_>>(), ["trail"]);
    assert_eq!(Str::lit("one").split_any(b" ").collect::<Vec<_>>(), ["one"]);
}

#[test]
fn split_results_borrow_source() {
    let arena = arena();
    let line = arena.alloc_str("k=v").expect("alloc");
    let mut parts = line.split(b"=");
    let key = parts.next().expect("key");
    assert_eq!(key.as_bytes().as_ptr(), line.as_bytes().as_ptr());
    assert_eq!(parts.next().expect("value"), "v");
    assert!(parts.next().is_none());
    assert!(parts.next().is_none());
}

#[test]
#[should_panic(expected = "separator cannot be empty")]
fn empty_separator_panics() {
    let _ = Str::lit("abc").split(b"");
}

#[test]
#[should_panic(expected = "charset cannot be empty")]
fn empty_charset_panics() {
    let _ = Str::lit("abc").split_any(b"");
}
