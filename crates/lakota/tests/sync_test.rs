//! Synchronization scenarios: fork + merge across repos, cache pod
//! behavior, cross-name pushes, convergence and garbage collection.

use std::time::Duration;

use chrono::NaiveDate;

use lakota::{Array, ColumnDef, DType, Frame, Repo, Schema};

fn ts(date: &str) -> i64 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp()
}

fn weather_schema() -> Schema {
    Schema::new(vec![
        ColumnDef::key("timestamp", DType::Timestamp),
        ColumnDef::value("value", DType::Float),
    ])
    .unwrap()
}

fn weather_frame(dates: &[&str], values: &[f64]) -> Frame {
    Frame::new(
        weather_schema(),
        vec![
            (
                "timestamp".to_string(),
                Array::Timestamp(dates.iter().map(|d| ts(d)).collect()),
            ),
            ("value".to_string(), Array::Float(values.to_vec())),
        ],
    )
    .unwrap()
}

fn values_of(frame: &Frame) -> Vec<f64> {
    match frame.column("value") {
        Some(Array::Float(v)) => v.clone(),
        other => panic!("unexpected value column: {other:?}"),
    }
}

// -------------------------------------------------------------------
// S3 — fork + merge
// -------------------------------------------------------------------

#[tokio::test]
async fn test_fork_and_merge() {
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();

    // Common state: the collection exists on both sides, no rows yet.
    let clct_a = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    repo_b.pull(&repo_a).await.unwrap();
    let clct_b = repo_b.collection("temperature").await.unwrap().unwrap();

    // Writer A then writer B, strictly later so B's epoch wins overlaps.
    clct_a
        .series("Brussels")
        .unwrap()
        .write(&weather_frame(
            &["2020-01-01", "2020-01-02", "2020-01-03"],
            &[0.0, 1.0, 2.0],
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    clct_b
        .series("Brussels")
        .unwrap()
        .write(&weather_frame(
            &["2020-01-02", "2020-01-03", "2020-01-04", "2020-01-05"],
            &[10.0, 11.0, 12.0, 13.0],
        ))
        .await
        .unwrap();

    // Pulling B's branch forks A's changelog.
    clct_a.pull(&clct_b).await.unwrap();
    assert_eq!(clct_a.changelog().leafs().await.unwrap().len(), 2);

    let merged = clct_a.merge().await.unwrap();
    assert_eq!(merged.len(), 2, "one revision per former head");

    // All heads share one child digest after merge.
    let leafs = clct_a.changelog().leafs().await.unwrap();
    let digests: std::collections::HashSet<_> =
        leafs.iter().map(|r| r.child.digest).collect();
    assert_eq!(digests.len(), 1);

    // Later epoch wins the overlap, non-overlapping rows combine.
    let out = clct_a
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(values_of(&out), vec![0.0, 10.0, 11.0, 12.0, 13.0]);

    // Merging again is a no-op.
    assert!(clct_a.merge().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_combines_disjoint_series() {
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();
    let clct_a = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    repo_b.pull(&repo_a).await.unwrap();
    let clct_b = repo_b.collection("temperature").await.unwrap().unwrap();

    // Forked writes touch different series entirely.
    clct_a
        .series("Brussels")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[1.0]))
        .await
        .unwrap();
    clct_b
        .series("Antwerp")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[2.0]))
        .await
        .unwrap();

    clct_a.pull(&clct_b).await.unwrap();
    clct_a.merge().await.unwrap();

    assert_eq!(clct_a.ls().await.unwrap(), vec!["Antwerp", "Brussels"]);
    let brussels = clct_a
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(values_of(&brussels), vec![1.0]);
    let antwerp = clct_a
        .series("Antwerp")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(values_of(&antwerp), vec![2.0]);
}

// -------------------------------------------------------------------
// S4 — cache behavior
// -------------------------------------------------------------------

#[tokio::test]
async fn test_cache_pod_repo() {
    let dir = tempfile::tempdir().unwrap();
    let remote_path = dir.path().join("remote");
    let remote_uri = format!("file://{}", remote_path.display());
    let frame = weather_frame(&["2020-01-01", "2020-01-02"], &[1.0, 2.0]);

    // Populate the remote directly.
    {
        let remote = Repo::open(&remote_uri).unwrap();
        let clct = remote
            .create_collection(&weather_schema(), "temperature")
            .await
            .unwrap();
        clct.series("Brussels").unwrap().write(&frame).await.unwrap();
    }

    // Cached composition: memory in front, the file pod authoritative.
    let cached = Repo::open_many(&["memory://", remote_uri.as_str()]).unwrap();
    let clct = cached.collection("temperature").await.unwrap().unwrap();
    let out = clct
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(out, frame);

    // Destroy the remote: listings fail, so history reads as empty even
    // though the memory tier still holds every byte.
    let hidden = dir.path().join("hidden");
    std::fs::rename(&remote_path, &hidden).unwrap();
    let gone = clct
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert!(gone.is_empty());

    // Restore the remote but strip every content object (three-component
    // keys). The changelog listing comes from the remote; the object bytes
    // must now come from the warm cache.
    std::fs::rename(&hidden, &remote_path).unwrap();
    remove_content_objects(&remote_path);
    let back = clct
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(back, frame);
}

/// Delete every `aa/bb/rest` object file, leaving changelog directories
/// (which nest one level deeper) untouched.
fn remove_content_objects(root: &std::path::Path) {
    for top in std::fs::read_dir(root).unwrap() {
        let top = top.unwrap().path();
        if !top.is_dir() {
            continue;
        }
        for mid in std::fs::read_dir(&top).unwrap() {
            let mid = mid.unwrap().path();
            if !mid.is_dir() {
                continue;
            }
            for leaf in std::fs::read_dir(&mid).unwrap() {
                let leaf = leaf.unwrap().path();
                if leaf.is_file() {
                    std::fs::remove_file(leaf).unwrap();
                }
            }
        }
    }
}

// -------------------------------------------------------------------
// S5 — push under a different name
// -------------------------------------------------------------------

#[tokio::test]
async fn test_push_across_collection_names() {
    let local = Repo::open("memory://").unwrap();
    let remote = Repo::open("memory://").unwrap();

    let rainfall = local
        .create_collection(&weather_schema(), "rainfall")
        .await
        .unwrap();
    let precipitation = remote
        .create_collection(&weather_schema(), "precipitation")
        .await
        .unwrap();

    let frame = weather_frame(&["2020-01-01", "2020-01-02"], &[3.5, 7.2]);
    rainfall
        .series("Brussels")
        .unwrap()
        .write(&frame)
        .await
        .unwrap();

    let stats = rainfall.push(&precipitation).await.unwrap();
    assert!(stats.revisions > 0);

    let out = precipitation
        .series("Brussels")
        .unwrap()
        .read(None, None)
        .await
        .unwrap();
    assert_eq!(out, frame);
}

// -------------------------------------------------------------------
// Convergence (push then pull reaches a fixed point)
// -------------------------------------------------------------------

#[tokio::test]
async fn test_push_pull_fixed_point() {
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();

    let clct_a = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    clct_a
        .series("Brussels")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[1.0]))
        .await
        .unwrap();

    let clct_b = repo_b
        .create_collection(&weather_schema(), "rainfall")
        .await
        .unwrap();
    clct_b
        .series("Ghent")
        .unwrap()
        .write(&weather_frame(&["2020-01-02"], &[2.0]))
        .await
        .unwrap();

    // Round one: exchange both ways.
    repo_a.push(&repo_b).await.unwrap();
    repo_a.pull(&repo_b).await.unwrap();

    // Round two is a no-op in both directions.
    assert!(repo_a.push(&repo_b).await.unwrap().is_noop());
    assert!(repo_a.pull(&repo_b).await.unwrap().is_noop());

    // Both sides see both collections and the same data.
    for repo in [&repo_a, &repo_b] {
        let mut names = repo.ls().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["rainfall", "temperature"]);
        let clct = repo.collection("temperature").await.unwrap().unwrap();
        let out = clct
            .series("Brussels")
            .unwrap()
            .read(None, None)
            .await
            .unwrap();
        assert_eq!(values_of(&out), vec![1.0]);
    }
}

#[tokio::test]
async fn test_pull_is_idempotent() {
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();
    let clct = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    clct.series("s")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[1.0]))
        .await
        .unwrap();

    let first = repo_b.pull(&repo_a).await.unwrap();
    assert!(!first.is_noop());
    assert!(repo_b.pull(&repo_a).await.unwrap().is_noop());
    assert!(repo_b.pull(&repo_a).await.unwrap().is_noop());
}

#[tokio::test]
async fn test_pull_reports_fork_to_caller() {
    // A diverging write on both sides leaves two heads after pull; the
    // caller is expected to merge.
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();
    let clct_a = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    repo_b.pull(&repo_a).await.unwrap();
    let clct_b = repo_b.collection("temperature").await.unwrap().unwrap();

    clct_a
        .series("s")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[1.0]))
        .await
        .unwrap();
    clct_b
        .series("s")
        .unwrap()
        .write(&weather_frame(&["2020-01-09"], &[9.0]))
        .await
        .unwrap();

    clct_a.pull(&clct_b).await.unwrap();
    assert_eq!(clct_a.changelog().leafs().await.unwrap().len(), 2);

    // A write against the forked collection flags the fork.
    let outcome = clct_a
        .series("s")
        .unwrap()
        .write(&weather_frame(&["2020-01-05"], &[5.0]))
        .await
        .unwrap();
    assert!(outcome.forked);
}

// -------------------------------------------------------------------
// Pack & gc
// -------------------------------------------------------------------

#[tokio::test]
async fn test_pack_then_read_and_sync() {
    let repo_a = Repo::open("memory://").unwrap();
    let clct_a = repo_a
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    let series = clct_a.series("s").unwrap();
    series
        .write(&weather_frame(&["2020-01-01", "2020-01-02"], &[1.0, 2.0]))
        .await
        .unwrap();
    series
        .write(&weather_frame(&["2020-01-03"], &[3.0]))
        .await
        .unwrap();

    let packed = clct_a.changelog().pack().await.unwrap();
    assert_eq!(packed, 2);

    // Reads and further writes keep working on the packed log.
    let out = series.read(None, None).await.unwrap();
    assert_eq!(values_of(&out), vec![1.0, 2.0, 3.0]);
    series
        .write(&weather_frame(&["2020-01-04"], &[4.0]))
        .await
        .unwrap();
    assert_eq!(clct_a.changelog().log().await.unwrap().len(), 3);

    // Pulling from a packed changelog materializes loose entries remotely.
    let repo_b = Repo::open("memory://").unwrap();
    repo_b.pull(&repo_a).await.unwrap();
    let clct_b = repo_b.collection("temperature").await.unwrap().unwrap();
    let out = clct_b.series("s").unwrap().read(None, None).await.unwrap();
    assert_eq!(values_of(&out), vec![1.0, 2.0, 3.0, 4.0]);
}

#[tokio::test]
async fn test_gc_removes_only_unreferenced_objects() {
    let repo = Repo::open("memory://").unwrap();
    let clct = repo
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    let series = clct.series("s").unwrap();
    let frame = weather_frame(&["2020-01-01", "2020-01-02"], &[1.0, 2.0]);
    series.write(&frame).await.unwrap();

    // Nothing is unreferenced yet.
    assert_eq!(repo.gc().await.unwrap(), 0);

    // Overwritten revisions stay referenced: every object survives and
    // reads still succeed after gc.
    series
        .write(&weather_frame(&["2020-01-01", "2020-01-02"], &[9.0, 9.0]))
        .await
        .unwrap();
    assert_eq!(repo.gc().await.unwrap(), 0);
    let out = series.read(None, None).await.unwrap();
    assert_eq!(values_of(&out), vec![9.0, 9.0]);
}

#[tokio::test]
async fn test_gc_sweeps_orphan_object() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("file://{}", dir.path().display());
    let repo = Repo::open(&uri).unwrap();
    let clct = repo
        .create_collection(&weather_schema(), "temperature")
        .await
        .unwrap();
    clct.series("s")
        .unwrap()
        .write(&weather_frame(&["2020-01-01"], &[1.0]))
        .await
        .unwrap();

    // Plant an orphaned content object on disk.
    let orphan = lakota::Digest::compute(b"orphaned bytes");
    let path = dir.path().join(orphan.hashed_path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"orphaned bytes").unwrap();

    assert_eq!(repo.gc().await.unwrap(), 1);
    assert!(!path.exists());

    // Live data is untouched.
    let out = clct.series("s").unwrap().read(None, None).await.unwrap();
    assert_eq!(values_of(&out), vec![1.0]);
}

// -------------------------------------------------------------------
// Registry merge across repos
// -------------------------------------------------------------------

#[tokio::test]
async fn test_registry_merge_after_concurrent_creates() {
    let repo_a = Repo::open("memory://").unwrap();
    let repo_b = Repo::open("memory://").unwrap();

    repo_a
        .create_collection(&weather_schema(), "alpha")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    repo_b
        .create_collection(&weather_schema(), "beta")
        .await
        .unwrap();

    repo_a.pull(&repo_b).await.unwrap();
    repo_a.merge().await.unwrap();

    let names = repo_a.ls().await.unwrap();
    assert_eq!(names, vec!["alpha", "beta"]);
}
