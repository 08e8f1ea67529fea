//! Verify request rendering against JSON test vectors stored in `test-vectors/`.
//!
//! Each case describes a descriptor and the exact wire request it must render
//! to, including header order.

use callout_core::{render, CallDescriptor, HttpMethod};

fn parse_method(s: &str) -> HttpMethod {
    s.parse()
        .unwrap_or_else(|_| panic!("unknown method: {s}"))
}

fn pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

#[test]
fn render_test_vectors() {
    let raw = include_str!("../../test-vectors/render.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let expected = &case["expected_request"];

        let headers = pairs(&input["headers"]);
        let borrowed: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let desc = CallDescriptor::with_custom_headers(
            "Vectors",
            parse_method(input["method"].as_str().unwrap()),
            input["path"].as_str().unwrap(),
            input["query"].as_str().unwrap(),
            input["body"].as_str().unwrap(),
            &borrowed,
        );

        let req = render(&desc.freeze().unwrap());
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, expected["path"].as_str().unwrap(), "{name}: path");
        assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: headers");
        assert_eq!(req.body.as_deref(), expected["body"].as_str(), "{name}: body");
        assert_eq!(req.endpoint_key, "Vectors", "{name}: endpoint key");
    }
}
