/*
 * Copyright 2023 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::HashSet;

/// Removes resources whose key was already seen, keeping the first one, and
/// orders the rest by key (byte-wise, ascending).
///
/// The output depends only on the set of first occurrences, never on the
/// order they were generated in.
pub fn normalize<T>(resources: impl IntoIterator<Item = (String, T)>) -> Vec<(String, T)> {
    let mut seen = HashSet::new();
    let mut resources: Vec<_> = resources
        .into_iter()
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect();

    resources.sort_unstable_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
    resources
}

/// [`normalize`] for collections nested inside a resource, keyed by `key`.
pub fn normalize_by<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    normalize(items.into_iter().map(|item| (key(&item), item)))
        .into_iter()
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys<T>(resources: &[(String, T)]) -> Vec<&str> {
        resources.iter().map(|(key, _)| &**key).collect()
    }

    #[test]
    fn dedup_and_sort() {
        let resources = normalize([
            ("10.0.0.5:80".to_owned(), 1),
            ("10.0.0.2:443".to_owned(), 2),
            ("10.0.0.2:443".to_owned(), 3),
        ]);

        assert_eq!(keys(&resources), ["10.0.0.2:443", "10.0.0.5:80"]);
        // The first occurrence of a duplicate wins.
        assert_eq!(resources[0].1, 2);
    }

    #[test]
    fn independent_of_input_order() {
        let inputs = ["b", "a", "c", "ab", "B"];
        let expected = normalize(inputs.map(|key| (key.to_owned(), ())));

        let mut reversed = inputs;
        reversed.reverse();
        assert_eq!(normalize(reversed.map(|key| (key.to_owned(), ()))), expected);
        assert_eq!(keys(&expected), ["B", "a", "ab", "b", "c"]);
    }

    #[test]
    fn byte_wise_ordering() {
        let resources = normalize(["10.0.0.10:80", "10.0.0.9:80", "10.0.0.1:8080"].map(|key| (key.to_owned(), ())));
        assert_eq!(
            keys(&resources),
            ["10.0.0.10:80", "10.0.0.1:8080", "10.0.0.9:80"]
        );
    }

    #[test]
    fn empty() {
        assert!(normalize(Vec::<(String, ())>::new()).is_empty());
    }

    #[test]
    fn nested_collections() {
        let hosts = normalize_by(vec!["b.svc", "a.svc", "b.svc"], |host| host.to_string());
        assert_eq!(hosts, ["a.svc", "b.svc"]);
    }
}
