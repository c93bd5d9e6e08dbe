use proptest::prelude::*;
use trust_injector::property::{decode, encode, Dictionary, Format, PropertyTree};

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_:/.<>&\"'é-]{0,24}").expect("text regex")
}

fn tree_strategy() -> impl Strategy<Value = PropertyTree> {
    let leaf = prop_oneof![
        text_strategy().prop_map(PropertyTree::String),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(PropertyTree::Data),
        any::<i64>().prop_map(PropertyTree::Integer),
        any::<bool>().prop_map(PropertyTree::Boolean),
    ];

    leaf.prop_recursive(5, 96, 8, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..8).prop_map(PropertyTree::Array),
            proptest::collection::vec((text_strategy(), inner), 0..8).prop_map(|entries| {
                PropertyTree::Dictionary(entries.into_iter().collect::<Dictionary>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn xml_round_trips_arbitrary_trees(tree in tree_strategy()) {
        let bytes = encode(&tree, Format::Xml).expect("encode xml");
        let decoded = decode(&bytes).expect("decode xml");
        prop_assert_eq!(decoded, tree);
    }

    #[test]
    fn binary_round_trips_arbitrary_trees(tree in tree_strategy()) {
        let bytes = encode(&tree, Format::Binary).expect("encode binary");
        let decoded = decode(&bytes).expect("decode binary");
        prop_assert_eq!(decoded, tree);
    }

    #[test]
    fn xml_output_is_stable_across_reencoding(tree in tree_strategy()) {
        let first = encode(&tree, Format::Xml).expect("encode xml");
        let second = encode(&decode(&first).expect("decode xml"), Format::Xml).expect("re-encode xml");
        prop_assert_eq!(first, second);
    }
}
