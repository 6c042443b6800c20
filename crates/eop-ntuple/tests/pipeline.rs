use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use eop_core::{scan_events, EopAxis, EopGrid, EventSource, Extractor, Selection, Subsample};
use eop_ntuple::{GridArtifact, NtupleChain};

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("eop_ntuple_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn cand_json(seed_ix: i32, energy: f32, p: f32) -> String {
    format!(
        concat!(
            r#"{{"charge":-1,"seed_ix":{},"seed_iy":100,"eta_sc":0.5,"phi_sc":0.1,"#,
            r#""eta":0.5,"phi":0.1,"energy_raw":{},"energy":{},"p":{}}}"#
        ),
        seed_ix, energy, energy, p
    )
}

fn event_json(event: u64, cands: &[String]) -> String {
    format!(
        r#"{{"run":362616,"lumi":44,"event":{},"mee":91.2,"candidates":[{}]}}"#,
        event,
        cands.join(",")
    )
}

/// Twelve one-candidate events cycling over three barrel rings, with every
/// E/p ratio inside the default axis range.
fn sample_lines() -> Vec<String> {
    let rings = [-14, 20, -3];
    (0..12u64)
        .map(|i| {
            let cand = cand_json(rings[(i % 3) as usize], 40.0 + i as f32, 40.0);
            event_json(i, &[cand])
        })
        .collect()
}

fn jsonl(lines: &[String]) -> Vec<u8> {
    let mut text = lines.join("\n");
    text.push('\n');
    text.into_bytes()
}

fn scan(mut chain: NtupleChain, subsample: Subsample) -> EopGrid {
    let selection = Selection::compile("p > 0").unwrap();
    let mut grid = EopGrid::new("EopEta", EopAxis::default());
    scan_events(&mut chain, &selection, &Extractor::new(), subsample, &mut grid).unwrap();
    grid
}

#[test]
fn files_on_disk_read_like_memory_buffers() {
    let lines = sample_lines();
    let (head, tail) = lines.split_at(5);
    let path_a = tmp_path("chain_a.jsonl");
    let path_b = tmp_path("chain_b.jsonl");
    std::fs::write(&path_a, jsonl(head)).unwrap();
    std::fs::write(&path_b, jsonl(tail)).unwrap();

    let mut from_disk = NtupleChain::open(&[path_a.clone(), path_b.clone()]).unwrap();
    let mut from_memory = NtupleChain::from_bytes(vec![jsonl(head), jsonl(tail)]);
    assert_eq!(from_disk.n_files(), 2);
    assert_eq!(from_disk.entries(), 12);
    assert_eq!(from_disk.entries(), from_memory.entries());

    loop {
        match (from_disk.next_event(), from_memory.next_event()) {
            (None, None) => break,
            (disk, memory) => {
                assert_eq!(disk.unwrap().unwrap(), memory.unwrap().unwrap());
            }
        }
    }

    let _ = std::fs::remove_file(&path_a);
    let _ = std::fs::remove_file(&path_b);
}

#[test]
fn open_rejects_missing_file() {
    let err = NtupleChain::open(&[tmp_path("does_not_exist.jsonl")]).unwrap_err();
    assert!(err.to_string().contains("failed to open"), "unexpected error: {}", err);
}

#[test]
fn odd_and_even_scans_recombine_into_full() {
    let data = jsonl(&sample_lines());
    let full = scan(NtupleChain::from_bytes(vec![data.clone()]), Subsample::Full);
    let mut odd = scan(NtupleChain::from_bytes(vec![data.clone()]), Subsample::Odd);
    let even = scan(NtupleChain::from_bytes(vec![data]), Subsample::Even);

    assert_eq!(full.entries(), 12);
    assert_eq!(odd.entries() + even.entries(), full.entries());

    odd.merge(&even).unwrap();
    for ((_, merged), (_, reference)) in odd.columns().zip(full.columns()) {
        for (a, b) in merged.iter().zip(reference.iter()) {
            assert_relative_eq!(a, b);
        }
    }
}

#[test]
fn scanned_grid_normalizes_to_unit_columns() {
    let mut grid = scan(NtupleChain::from_bytes(vec![jsonl(&sample_lines())]), Subsample::Full);
    let summary = grid.normalize_rings();
    assert_eq!(summary.normalized, 3);
    assert!(summary.degenerate.contains(&0));

    let artifact = GridArtifact::from_grid(&grid, "full");
    assert_eq!(artifact.subsample, "full");
    assert_eq!(artifact.entries, 12);
    for ring in [-14, 20, -3] {
        let col = artifact.columns.iter().find(|c| c.ring == ring).unwrap();
        assert_relative_eq!(col.total(), 1.0, epsilon = 1e-6);
    }
}

#[test]
fn artifact_survives_a_file_round_trip() {
    let mut grid = scan(NtupleChain::from_bytes(vec![jsonl(&sample_lines())]), Subsample::Odd);
    grid.normalize_rings();
    let artifact = GridArtifact::from_grid(&grid, "odd");

    let path = tmp_path("EopEta.json");
    artifact.write(&path).unwrap();
    let back = GridArtifact::read(&path).unwrap();
    assert_eq!(back, artifact);

    let _ = std::fs::remove_file(&path);
}
