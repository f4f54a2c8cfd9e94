use std::collections::HashSet;
use std::path::Path;

fn main() {
    let vocabulary_path = Path::new("data/rank_aliases.json");
    validate_vocabulary_file(vocabulary_path);
    set_build_dependencies();
}

fn validate_vocabulary_file(vocabulary_path: &Path) {
    // Ensure vocabulary exists at build time
    assert!(
        vocabulary_path.exists(),
        "\n\nRANK VOCABULARY BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the rank vocabulary before building.\n",
        vocabulary_path.display()
    );

    let contents = std::fs::read_to_string(vocabulary_path).unwrap_or_else(|e| {
        panic!(
            "\n\nRANK VOCABULARY BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            vocabulary_path.display()
        );
    });

    let vocabulary: serde_json::Value = serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nRANK VOCABULARY BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            vocabulary_path.display()
        );
    });

    validate_vocabulary_structure(&vocabulary);
}

fn validate_vocabulary_structure(vocabulary: &serde_json::Value) {
    assert!(
        vocabulary.is_object(),
        "\n\nRANK VOCABULARY BUILD ERROR: Root must be a JSON object\n\
         Got: {vocabulary}\n"
    );

    let ranks = vocabulary.get("ranks").unwrap_or_else(|| {
        panic!(
            "\n\nRANK VOCABULARY BUILD ERROR: Missing 'ranks' field\n\
             The vocabulary must have a top-level 'ranks' array.\n"
        );
    });

    let ranks = ranks.as_array().unwrap_or_else(|| {
        panic!(
            "\n\nRANK VOCABULARY BUILD ERROR: 'ranks' must be an array\n\
             Got: {ranks}\n"
        );
    });

    let total_aliases = validate_ranks(ranks);

    println!(
        "cargo:warning=Validated rank vocabulary: {} ranks, {total_aliases} aliases",
        ranks.len()
    );
}

fn validate_ranks(ranks: &[serde_json::Value]) -> usize {
    // Every token (rank name or alias) must map to exactly one rank
    let mut seen: HashSet<String> = HashSet::new();
    let mut total_aliases = 0;

    for (i, rank) in ranks.iter().enumerate() {
        let name = rank
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                panic!(
                    "\n\nRANK VOCABULARY BUILD ERROR: Rank at index {i} missing string 'name' field\n"
                );
            });

        assert!(
            !name.trim().is_empty(),
            "\n\nRANK VOCABULARY BUILD ERROR: Rank at index {i} has an empty name\n"
        );
        assert!(
            seen.insert(name.to_lowercase()),
            "\n\nRANK VOCABULARY BUILD ERROR: Token '{name}' is defined more than once\n"
        );

        let aliases = rank
            .get("aliases")
            .and_then(|v| v.as_array())
            .unwrap_or_else(|| {
                panic!(
                    "\n\nRANK VOCABULARY BUILD ERROR: Rank '{name}' (index {i}) missing 'aliases' array\n"
                );
            });

        for alias in aliases {
            let alias = alias.as_str().unwrap_or_else(|| {
                panic!(
                    "\n\nRANK VOCABULARY BUILD ERROR: Rank '{name}' has a non-string alias\n"
                );
            });
            assert!(
                seen.insert(alias.to_lowercase()),
                "\n\nRANK VOCABULARY BUILD ERROR: Token '{alias}' is defined more than once\n"
            );
        }
        total_aliases += aliases.len();
    }

    total_aliases
}

fn set_build_dependencies() {
    // Tell cargo to rerun if the vocabulary changes
    println!("cargo:rerun-if-changed=data/rank_aliases.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
