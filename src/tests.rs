use super::*;
use crate::data::{GdsDataType, GdsFloat64, GdsRecordType};
use byteorder::{BigEndian, WriteBytesExt};
use std::f64::consts::FRAC_PI_2;
use std::io::Write;

/// Append a raw record to `buf`: length, type bytes, payload
fn rec(buf: &mut Vec<u8>, rtype: GdsRecordType, dtype: GdsDataType, payload: &[u8]) {
    rec_raw(buf, rtype as u8, dtype as u8, payload);
}
/// Same, from raw type bytes, for records the enum does not name
fn rec_raw(buf: &mut Vec<u8>, rtype: u8, dtype: u8, payload: &[u8]) {
    buf.write_u16::<BigEndian>((payload.len() + 4) as u16).unwrap();
    buf.push(rtype);
    buf.push(dtype);
    buf.extend_from_slice(payload);
}
fn rec_marker(buf: &mut Vec<u8>, rtype: GdsRecordType) {
    rec(buf, rtype, GdsDataType::NoData, &[]);
}
fn rec_i16(buf: &mut Vec<u8>, rtype: GdsRecordType, val: i16) {
    rec(buf, rtype, GdsDataType::I16, &val.to_be_bytes());
}
fn rec_str(buf: &mut Vec<u8>, rtype: GdsRecordType, s: &str) {
    let mut payload = s.as_bytes().to_vec();
    if payload.len() % 2 != 0 {
        payload.push(0x00);
    }
    rec(buf, rtype, GdsDataType::Str, &payload);
}
fn rec_f64(buf: &mut Vec<u8>, rtype: GdsRecordType, val: f64) {
    rec(buf, rtype, GdsDataType::F64, &GdsFloat64::encode(val).to_be_bytes());
}
fn rec_xy(buf: &mut Vec<u8>, pts: &[(i32, i32)]) {
    let mut payload = Vec::with_capacity(8 * pts.len());
    for (x, y) in pts {
        payload.extend_from_slice(&x.to_be_bytes());
        payload.extend_from_slice(&y.to_be_bytes());
    }
    rec(buf, GdsRecordType::Xy, GdsDataType::I32, &payload);
}
/// The 16-byte UNITS payload for the given scales
fn units_payload(uu: f64, meters: f64) -> [u8; 16] {
    let mut raw = [0u8; 16];
    raw[..8].copy_from_slice(&GdsFloat64::encode(uu).to_be_bytes());
    raw[8..].copy_from_slice(&GdsFloat64::encode(meters).to_be_bytes());
    raw
}
/// Standard stream prologue: HEADER, BGNLIB, LIBNAME, UNITS
fn stream_header(buf: &mut Vec<u8>, uu: f64, meters: f64) {
    rec_i16(buf, GdsRecordType::Header, 600);
    rec(buf, GdsRecordType::BgnLib, GdsDataType::I16, &[0; 24]);
    rec_str(buf, GdsRecordType::LibName, "testlib");
    rec(
        buf,
        GdsRecordType::Units,
        GdsDataType::F64,
        &units_payload(uu, meters),
    );
}
fn begin_cell(buf: &mut Vec<u8>, name: &str) {
    rec(buf, GdsRecordType::BgnStr, GdsDataType::I16, &[0; 24]);
    rec_str(buf, GdsRecordType::StrName, name);
}
fn boundary_elem(buf: &mut Vec<u8>, layer: i16, pts: &[(i32, i32)]) {
    rec_marker(buf, GdsRecordType::Boundary);
    rec_i16(buf, GdsRecordType::Layer, layer);
    rec_i16(buf, GdsRecordType::DataType, 0);
    rec_xy(buf, pts);
    rec_marker(buf, GdsRecordType::EndEl);
}
fn path_elem(buf: &mut Vec<u8>, layer: i16, width: i32, path_type: i16, pts: &[(i32, i32)]) {
    rec_marker(buf, GdsRecordType::Path);
    rec_i16(buf, GdsRecordType::Layer, layer);
    rec_i16(buf, GdsRecordType::DataType, 0);
    rec_i16(buf, GdsRecordType::PathType, path_type);
    rec(buf, GdsRecordType::Width, GdsDataType::I32, &width.to_be_bytes());
    rec_xy(buf, pts);
    rec_marker(buf, GdsRecordType::EndEl);
}
/// Parse a byte stream as a [GdsLibrary], via a temporary file
fn parse_bytes(bytes: &[u8]) -> GdsResult<GdsLibrary> {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(bytes).unwrap();
    GdsLibrary::from_file(file)
}
/// A closed square ring of side `size`, lower-left at `(x, y)`
fn square(layer: i16, x: i32, y: i32, size: i32) -> GdsBoundary {
    GdsBoundary {
        layer,
        xy: GdsPoint::vec(&[
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ]),
    }
}
/// An in-memory library over `cells`, with default units and references resolved
fn lib_of(cells: Vec<GdsCell>) -> GdsLibrary {
    let mut lib = GdsLibrary {
        cells,
        units_raw: units_payload(1e-3, 1e-9),
        ..Default::default()
    };
    lib.resolve_refs();
    lib
}
/// A single cell "GRID" of 100 unit squares on a 10x10 grid at 1000-unit pitch
fn grid_lib() -> GdsLibrary {
    let mut cell = GdsCell::new("GRID");
    for i in 0..10 {
        for j in 0..10 {
            cell.elems.push(square(1, i * 1000, j * 1000, 1).into());
        }
    }
    lib_of(vec![cell])
}

#[test]
fn it_round_trips_reals() {
    for v in [1.0, 0.5, 1e-9, 1e-3, -2.5, 16.0, 255.0] {
        let decoded = GdsFloat64::decode(&GdsFloat64::encode(v).to_be_bytes()).unwrap();
        assert!(
            (decoded - v).abs() <= v.abs() * f64::EPSILON,
            "{} decoded as {}",
            v,
            decoded
        );
    }
}
#[test]
fn it_decodes_big_endian_integers() -> GdsResult<()> {
    // One vertex from raw big-endian two's-complement bytes: (1, -1)
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "INT");
    rec_marker(&mut buf, GdsRecordType::Boundary);
    rec_i16(&mut buf, GdsRecordType::Layer, 0);
    rec(
        &mut buf,
        GdsRecordType::Xy,
        GdsDataType::I32,
        &[0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF],
    );
    rec_marker(&mut buf, GdsRecordType::EndEl);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);

    let lib = parse_bytes(&buf)?;
    match &lib.cells[0].elems[0] {
        GdsElement::GdsBoundary(b) => assert_eq!(b.xy, vec![GdsPoint::new(1, -1)]),
        other => panic!("unexpected element {:?}", other),
    };
    Ok(())
}
#[test]
fn it_parses_a_minimal_stream() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "T");
    boundary_elem(&mut buf, 1, &[(0, 0), (100, 0), (100, 100), (0, 100), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);

    let lib = parse_bytes(&buf)?;
    assert_eq!(lib.version, 600);
    assert!((lib.uu() - 1e-3).abs() <= 1e-3 * f64::EPSILON);
    assert_eq!(lib.cells.len(), 1);
    assert_eq!(lib.cells[0].name, "T");
    assert_eq!(lib.cells[0].elems.len(), 1);
    match &lib.cells[0].elems[0] {
        GdsElement::GdsBoundary(b) => {
            assert_eq!(b.layer, 1);
            assert_eq!(b.xy.len(), 5);
            assert_eq!(b.xy[0], b.xy[4]);
        }
        other => panic!("unexpected element {:?}", other),
    };

    // A 50x50-db-unit window at the origin intersects the polygon's extents
    let opts = ExtractOptions {
        bounds: Some(Bounds::new(0.0, 0.0, 0.050, 0.050)),
        ..Default::default()
    };
    assert_eq!(lib.extract_polygons("T", &opts, None)?.len(), 1);

    // A window at (1000, 1000) is disjoint from them
    let opts = ExtractOptions {
        bounds: Some(Bounds::new(1.0, 1.0, 0.5, 0.5)),
        ..Default::default()
    };
    assert_eq!(lib.extract_polygons("T", &opts, None)?.len(), 0);
    Ok(())
}
#[test]
fn it_round_trips_boundaries() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "SQ");
    boundary_elem(
        &mut buf,
        5,
        &[(0, 0), (1000, 0), (1000, 1000), (0, 1000), (0, 0)],
    );
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);
    let lib = parse_bytes(&buf)?;
    let polys = lib.extract_polygons("SQ", &ExtractOptions::default(), None)?;
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].layer, 5);

    // Write the flat set to disk, read it back, flatten again, compare
    let dir = tempfile::tempdir().unwrap();
    let fname = dir.path().join("flat.gds");
    lib.write_polys(&fname, &polys)?;
    let lib2 = GdsLibrary::open(&fname)?;
    assert_eq!(lib2.units_raw, lib.units_raw);
    let polys2 = lib2.extract_polygons("TOP", &ExtractOptions::default(), None)?;
    assert_eq!(polys, polys2);
    Ok(())
}
#[test]
fn it_expands_two_point_paths() {
    let ring = expand_path(&GdsPoint::vec(&[(0, 0), (1000, 0)]), 200, 0);
    assert_eq!(
        ring,
        GdsPoint::vec(&[(0, 100), (1000, 100), (1000, -100), (0, -100), (0, 100)])
    );
}
#[test]
fn it_extends_pathtype2_endcaps() {
    let ring = expand_path(&GdsPoint::vec(&[(0, 0), (1000, 0)]), 200, 2);
    assert_eq!(
        ring,
        GdsPoint::vec(&[(-100, 100), (1100, 100), (1100, -100), (-100, -100), (-100, 100)])
    );
}
#[test]
fn it_treats_pathtype1_as_flush() {
    let pts = GdsPoint::vec(&[(0, 0), (500, 0), (500, 500)]);
    assert_eq!(expand_path(&pts, 100, 1), expand_path(&pts, 100, 0));
}
#[test]
fn it_expands_paths_on_parse() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "WIRE");
    path_elem(&mut buf, 2, 200, 0, &[(0, 0), (1000, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);
    let lib = parse_bytes(&buf)?;
    let expected = GdsPoint::vec(&[(0, 100), (1000, 100), (1000, -100), (0, -100), (0, 100)]);
    match &lib.cells[0].elems[0] {
        GdsElement::GdsPath(p) => {
            assert_eq!(p.xy.len(), 2);
            assert_eq!(p.expanded, expected);
        }
        other => panic!("unexpected element {:?}", other),
    };
    // The flattener emits the expanded ring, not the centerline
    let polys = lib.extract_polygons("WIRE", &ExtractOptions::default(), None)?;
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].layer, 2);
    assert_eq!(polys[0].xy, expected);
    Ok(())
}
#[test]
fn it_parses_reference_attributes() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "CHILD");
    boundary_elem(&mut buf, 1, &[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    begin_cell(&mut buf, "PARENT");
    rec_marker(&mut buf, GdsRecordType::Sref);
    rec_str(&mut buf, GdsRecordType::SName, "CHILD");
    rec(
        &mut buf,
        GdsRecordType::Strans,
        GdsDataType::BitArray,
        &[0x80, 0x00],
    );
    rec_f64(&mut buf, GdsRecordType::Mag, 2.0);
    rec_f64(&mut buf, GdsRecordType::Angle, 90.0);
    rec_xy(&mut buf, &[(100, 200)]);
    rec_marker(&mut buf, GdsRecordType::EndEl);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);

    let lib = parse_bytes(&buf)?;
    match &lib.cells[1].elems[0] {
        GdsElement::GdsStructRef(sref) => {
            assert_eq!(sref.name, "CHILD");
            assert_eq!(sref.cell, Some(0));
            assert_eq!(sref.xy, GdsPoint::new(100, 200));
            assert_eq!(sref.mag, 2.0);
            assert!((sref.angle - FRAC_PI_2).abs() < 1e-12);
            assert!(sref.reflected());
        }
        other => panic!("unexpected element {:?}", other),
    };
    Ok(())
}
#[test]
fn it_composes_transforms() -> GdsResult<()> {
    // An SREF at (100, 200) with mag 2 and a quarter-turn carries the
    // child's vertex (10, 0) to (100, 220)
    let child = GdsCell {
        name: "CHILD".into(),
        elems: vec![GdsBoundary {
            layer: 1,
            xy: vec![GdsPoint::new(10, 0)],
        }
        .into()],
    };
    let parent = GdsCell {
        name: "PARENT".into(),
        elems: vec![GdsStructRef {
            name: "CHILD".into(),
            xy: GdsPoint::new(100, 200),
            mag: 2.0,
            angle: FRAC_PI_2,
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![parent, child]);
    let polys = lib.extract_polygons("PARENT", &ExtractOptions::default(), None)?;
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].xy, vec![GdsPoint::new(100, 220)]);
    Ok(())
}
#[test]
fn it_mirrors_before_rotating() {
    let tra = Transform {
        mirror: true,
        ..Default::default()
    };
    assert_eq!(tra.apply(GdsPoint::new(5, 7)), GdsPoint::new(5, -7));
}
#[test]
fn it_expands_arrays() -> GdsResult<()> {
    let child = GdsCell {
        name: "UNIT".into(),
        elems: vec![square(1, 0, 0, 10).into()],
    };
    let parent = GdsCell {
        name: "ARRAY".into(),
        elems: vec![GdsArrayRef {
            name: "UNIT".into(),
            xy: [
                GdsPoint::new(0, 0),
                GdsPoint::new(3000, 0),
                GdsPoint::new(0, 2000),
            ],
            cols: 3,
            rows: 2,
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![parent, child]);
    let polys = lib.extract_polygons("ARRAY", &ExtractOptions::default(), None)?;
    assert_eq!(polys.len(), 6);
    // One instance per lattice point of the 3x2 array
    let mut origins: Vec<(i32, i32)> = polys.iter().map(|p| (p.xy[0].x, p.xy[0].y)).collect();
    origins.sort();
    assert_eq!(
        origins,
        vec![(0, 0), (0, 1000), (1000, 0), (1000, 1000), (2000, 0), (2000, 1000)]
    );
    Ok(())
}
#[test]
fn it_rejects_outside_bounds() -> GdsResult<()> {
    // Of the hundred grid squares, a 500-unit window anchored at the
    // first keeps exactly one
    let lib = grid_lib();
    let opts = ExtractOptions {
        bounds: Some(Bounds::new(0.0, 0.0, 0.5, 0.5)),
        ..Default::default()
    };
    let polys = lib.extract_polygons("GRID", &opts, None)?;
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].xy[0], GdsPoint::new(0, 0));
    Ok(())
}
#[test]
fn it_caps_emitted_polygons() -> GdsResult<()> {
    let lib = grid_lib();
    let opts = ExtractOptions {
        max_polys: 3,
        ..Default::default()
    };
    assert_eq!(lib.extract_polygons("GRID", &opts, None)?.len(), 3);
    let opts = ExtractOptions {
        max_polys: 0,
        ..Default::default()
    };
    assert_eq!(lib.extract_polygons("GRID", &opts, None)?.len(), 0);
    Ok(())
}
#[test]
fn it_rebases_onto_the_window() -> GdsResult<()> {
    // The grid square at (2000, 2000), shifted onto the window corner
    let lib = grid_lib();
    let opts = ExtractOptions {
        bounds: Some(Bounds::new(2.0, 2.0, 0.5, 0.5)),
        rebase: true,
        ..Default::default()
    };
    let polys = lib.extract_polygons("GRID", &opts, None)?;
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].xy[0], GdsPoint::new(0, 0));
    assert_eq!(polys[0].xy[2], GdsPoint::new(1, 1));
    Ok(())
}
#[test]
fn it_skips_unresolved_references() -> GdsResult<()> {
    let parent = GdsCell {
        name: "P".into(),
        elems: vec![GdsStructRef {
            name: "GHOST".into(),
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![parent]);
    let polys = lib.extract_polygons("P", &ExtractOptions::default(), None)?;
    assert_eq!(polys.len(), 0);
    Ok(())
}
#[test]
fn it_fails_on_missing_cells() {
    let lib = grid_lib();
    match lib.extract_polygons("NO_SUCH_CELL", &ExtractOptions::default(), None) {
        Err(GdsError::CellNotFound(name)) => assert_eq!(name, "NO_SUCH_CELL"),
        other => panic!("expected CellNotFound, got {:?}", other),
    };
}
#[test]
fn it_errors_on_cyclic_references() {
    let a = GdsCell {
        name: "A".into(),
        elems: vec![GdsStructRef {
            name: "B".into(),
            ..Default::default()
        }
        .into()],
    };
    let b = GdsCell {
        name: "B".into(),
        elems: vec![GdsStructRef {
            name: "A".into(),
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![a, b]);
    match lib.extract_polygons("A", &ExtractOptions::default(), None) {
        Err(GdsError::RecursionLimit(_)) => (),
        other => panic!("expected RecursionLimit, got {:?}", other),
    };
}
#[test]
fn it_interrupts_via_callback() {
    // A 1000x1000 array scans exactly one callback interval of polygons.
    // The far-away window keeps memory flat while every one is scanned.
    let child = GdsCell {
        name: "U".into(),
        elems: vec![square(1, 0, 0, 10).into()],
    };
    let parent = GdsCell {
        name: "SEA".into(),
        elems: vec![GdsArrayRef {
            name: "U".into(),
            xy: [
                GdsPoint::new(0, 0),
                GdsPoint::new(1_000_000, 0),
                GdsPoint::new(0, 1_000_000),
            ],
            cols: 1000,
            rows: 1000,
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![parent, child]);
    let opts = ExtractOptions {
        bounds: Some(Bounds::new(9000.0, 9000.0, 1.0, 1.0)),
        ..Default::default()
    };
    let mut calls = 0u32;
    let mut cb = |emitted: u64, scanned: u64| -> bool {
        calls += 1;
        assert_eq!(scanned, 1_000_000);
        assert_eq!(emitted, 0);
        true // request termination
    };
    match lib.extract_polygons("SEA", &opts, Some(&mut cb)) {
        Err(GdsError::Interrupted) => (),
        other => panic!("expected Interrupted, got {:?}", other),
    };
    assert_eq!(calls, 1);
}
#[test]
fn it_detects_top_cells() {
    // A references B references C: only A is a top
    let a = GdsCell {
        name: "A".into(),
        elems: vec![GdsStructRef {
            name: "B".into(),
            ..Default::default()
        }
        .into()],
    };
    let b = GdsCell {
        name: "B".into(),
        elems: vec![GdsStructRef {
            name: "C".into(),
            ..Default::default()
        }
        .into()],
    };
    let c = GdsCell::new("C");
    let lib = lib_of(vec![a, b, c]);
    let tops: Vec<&str> = lib.top_cells().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(tops, vec!["A"]);
    assert_eq!(lib.all_cells(), vec!["A", "B", "C"]);
}
#[test]
fn it_resolves_duplicate_names_to_the_first() {
    let dup1 = GdsCell {
        name: "DUP".into(),
        elems: vec![square(1, 0, 0, 1).into()],
    };
    let dup2 = GdsCell {
        name: "DUP".into(),
        elems: vec![square(2, 0, 0, 1).into()],
    };
    let parent = GdsCell {
        name: "P".into(),
        elems: vec![GdsStructRef {
            name: "DUP".into(),
            ..Default::default()
        }
        .into()],
    };
    let lib = lib_of(vec![parent, dup1, dup2]);
    let polys = lib
        .extract_polygons("P", &ExtractOptions::default(), None)
        .unwrap();
    assert_eq!(polys.len(), 1);
    assert_eq!(polys[0].layer, 1);
}
#[test]
fn it_tests_point_containment() {
    let sq = GdsPoint::vec(&[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    assert!(poly_contains_point(&sq, GdsPoint::new(5, 5)));
    assert!(!poly_contains_point(&sq, GdsPoint::new(15, 5)));
    // (0, 0) sits on the ring itself: implementation-defined, not asserted

    let tri = GdsPoint::vec(&[(0, 0), (10, 0), (0, 10), (0, 0)]);
    assert!(poly_contains_point(&tri, GdsPoint::new(2, 2)));
    assert!(!poly_contains_point(&tri, GdsPoint::new(8, 8)));
}
#[test]
fn it_skips_unknown_records() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    // A vendor extension at library level
    rec_raw(&mut buf, 0x70, 0x02, &[0xDE, 0xAD]);
    begin_cell(&mut buf, "T");
    rec_marker(&mut buf, GdsRecordType::Boundary);
    rec_i16(&mut buf, GdsRecordType::Layer, 3);
    // A property pair mid-element: valid GDSII, no bearing here
    rec_i16(&mut buf, GdsRecordType::PropAttr, 1);
    rec_str(&mut buf, GdsRecordType::PropValue, "metadata");
    rec_xy(&mut buf, &[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndEl);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);

    let lib = parse_bytes(&buf)?;
    assert_eq!(lib.cells.len(), 1);
    assert_eq!(lib.cells[0].elems.len(), 1);
    Ok(())
}
#[test]
fn it_discards_text_node_and_box_elements() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "T");
    // TEXT element: read, skimmed to its ENDEL, and dropped
    rec_marker(&mut buf, GdsRecordType::Text);
    rec_i16(&mut buf, GdsRecordType::Layer, 7);
    rec_i16(&mut buf, GdsRecordType::TextType, 0);
    rec_xy(&mut buf, &[(50, 50)]);
    rec_str(&mut buf, GdsRecordType::String, "net_a");
    rec_marker(&mut buf, GdsRecordType::EndEl);
    // As is this BOX
    rec_marker(&mut buf, GdsRecordType::Box);
    rec_i16(&mut buf, GdsRecordType::Layer, 8);
    rec_i16(&mut buf, GdsRecordType::BoxType, 0);
    rec_xy(&mut buf, &[(0, 0), (1, 0), (1, 1), (0, 1), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndEl);
    // The boundary after them survives
    boundary_elem(&mut buf, 1, &[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    rec_marker(&mut buf, GdsRecordType::EndLib);

    let lib = parse_bytes(&buf)?;
    assert_eq!(lib.cells[0].elems.len(), 1);
    assert_eq!(lib.stats().boundaries, 1);
    Ok(())
}
#[test]
fn it_keeps_the_well_formed_prefix_of_truncated_files() -> GdsResult<()> {
    let mut buf = Vec::new();
    stream_header(&mut buf, 1e-3, 1e-9);
    begin_cell(&mut buf, "WHOLE");
    boundary_elem(&mut buf, 1, &[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    rec_marker(&mut buf, GdsRecordType::EndStr);
    begin_cell(&mut buf, "CUT");
    rec_marker(&mut buf, GdsRecordType::Boundary);
    rec_i16(&mut buf, GdsRecordType::Layer, 2);
    rec_xy(&mut buf, &[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]);
    // Slice mid-way into the XY payload: the parse ends there, keeping
    // the whole cells before the cut and dropping the one inside it
    let lib = parse_bytes(&buf[..buf.len() - 10])?;
    assert_eq!(lib.all_cells(), vec!["WHOLE"]);
    Ok(())
}
#[test]
fn it_counts_stats() {
    let lib = grid_lib();
    let stats = lib.stats();
    assert_eq!(stats.cells, 1);
    assert_eq!(stats.boundaries, 100);
    assert_eq!(stats.paths, 0);
    assert_eq!(stats.struct_refs, 0);
    assert_eq!(stats.array_refs, 0);
}
#[test]
fn it_serializes_to_json() {
    let lib = grid_lib();
    let json = serde_json::to_string(&lib).unwrap();
    let back: GdsLibrary = serde_json::from_str(&json).unwrap();
    assert_eq!(lib, back);
}
#[test]
fn it_frames_written_records() -> GdsResult<()> {
    let raw = units_payload(1e-3, 1e-9);
    let poly = Poly {
        layer: 5,
        xy: GdsPoint::vec(&[(0, 0), (1, 0), (1, 1), (0, 1), (0, 0)]),
    };
    let mut buf = Vec::new();
    GdsWriter::new(&mut buf).write_flat(&raw, &[poly])?;
    // HEADER: length 6, type 0x00, dtype 0x02, version 600
    assert_eq!(buf[..6], [0x00, 0x06, 0x00, 0x02, 0x02, 0x58]);
    // BGNLIB: 24 zeroed date bytes
    assert_eq!(buf[6..10], [0x00, 0x1C, 0x01, 0x02]);
    assert_eq!(buf[10..34], [0u8; 24]);
    // LIBNAME: the empty string
    assert_eq!(buf[34..38], [0x00, 0x04, 0x02, 0x06]);
    // UNITS: source payload carried through verbatim
    assert_eq!(buf[38..42], [0x00, 0x14, 0x03, 0x05]);
    assert_eq!(buf[42..58], raw);
    // STRNAME: "TOP", NUL-padded to even length
    assert_eq!(buf[86..94], [0x00, 0x08, 0x06, 0x06, b'T', b'O', b'P', 0x00]);
    // Trailer: ENDSTR, then ENDLIB
    assert_eq!(buf[buf.len() - 8..], [0x00, 0x04, 0x07, 0x00, 0x00, 0x04, 0x04, 0x00]);
    Ok(())
}
#[test]
fn it_rejects_too_long_records() {
    // 9000 vertices cannot fit one XY record's 16-bit length field
    let poly = Poly {
        layer: 1,
        xy: vec![GdsPoint::default(); 9000],
    };
    let mut buf = Vec::new();
    match GdsWriter::new(&mut buf).write_flat(&units_payload(1e-3, 1e-9), &[poly]) {
        Err(GdsError::RecordLen(_)) => (),
        other => panic!("expected RecordLen, got {:?}", other),
    };
}
