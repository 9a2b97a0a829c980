//! A short scripted curation session.
//!
//! Run with: `cargo run --example curation`

use spikesort_core::labeling::ClusterLabeling;
use spikesort_core::metadata::ClusterMetadata;

fn print_record(up: &spikesort_core::update::ChangeRecord) {
    println!(
        "  {:<16} spikes={:?} added={:?} deleted={:?} descendants={:?}",
        up.description, up.spikes, up.added, up.deleted, up.descendants
    );
}

fn main() {
    let mut clustering = ClusterLabeling::new(vec![2, 5, 3, 2, 7, 5, 2]);
    println!("initial labels:   {:?}", clustering.spike_clusters());
    println!("cluster counts:   {:?}", clustering.cluster_counts());

    println!("\nmerge clusters 2 and 3:");
    let up = clustering.merge(&[2, 3], None).expect("merge");
    print_record(&up);
    println!("  labels now:     {:?}", clustering.spike_clusters());

    println!("\nsplit spike 0 out of its cluster:");
    let up = clustering.split(&[0], None).expect("split");
    print_record(&up);
    println!("  labels now:     {:?}", clustering.spike_clusters());

    println!("\nundo the split:");
    let up = clustering.undo().expect("undo");
    print_record(&up);
    println!("  labels now:     {:?}", clustering.spike_clusters());

    println!("\nredo it:");
    let up = clustering.redo().expect("redo");
    print_record(&up);
    println!("  labels now:     {:?}", clustering.spike_clusters());

    // Attach a quality label to one of the new clusters.
    let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
    metadata.register("quality", |_| 0);
    let target = up.added[0];

    println!("\nmark cluster {target} as good (quality 2):");
    let up = metadata.set("quality", &[target], 2);
    print_record(&up);
    println!(
        "  quality of {target}: {:?} (default elsewhere: {:?})",
        metadata.get("quality", target),
        metadata.get("quality", 9999)
    );
}
