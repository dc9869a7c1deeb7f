use orc_hash::content_hash;
use serde_json::json;

#[test]
fn identical_content_and_inputs_hash_identically_regardless_of_call_time() {
    let content = json!({"plan": "draft", "steps": [1, 2, 3]});
    let inputs = vec!["abc123".to_string()];

    let h1 = content_hash(&content, &inputs);
    std::thread::sleep(std::time::Duration::from_millis(5));
    let h2 = content_hash(&content, &inputs);

    assert_eq!(h1, h2, "hash must be a pure function of content + input_hashes");
}

#[test]
fn differing_input_hashes_change_content_hash() {
    let content = json!({"plan": "draft"});
    let h1 = content_hash(&content, &["a".into()]);
    let h2 = content_hash(&content, &["b".into()]);
    assert_ne!(h1, h2);
}
