#[test]
fn dbg_output() {
    use fastnj::*;
    let records = vec![
        SequenceRecord::new("A", "ATCGCG"),
        SequenceRecord::new("B", "ATCGAA"),
        SequenceRecord::new("C", "ATCGGG"),
    ];
    let s = build_tree(&records, &BuildConfig::default()).unwrap();
    eprintln!("OUTPUT: {}", s);

    let config = BuildConfig::default();
    let mut tree = Tree::from_records(&records, &config).unwrap();
    tree.construct_initial_topology(&config, &NoopDiagnostics).unwrap();
    tree.calculate_branch_lengths().unwrap();
    let s2 = newick::write(&tree).unwrap();
    eprintln!("NO-NNI: {}", s2);
    let root = tree.root().unwrap();
    let rn = tree.node(root);
    eprintln!("root children: {:?}", rn.children);
    for &c in &rn.children {
        let n = tree.node(c);
        eprintln!("  child {:?}: is_leaf={} name={:?}", c, n.is_leaf, n.name);
    }
}
