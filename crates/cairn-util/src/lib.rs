// Dense index newtypes. Each index wraps a u32 and can only index the
// collection it was made for, so a StateId can't accidentally index rules.
#[macro_export]
macro_rules! make_type_idx {
    ($vis:vis $type_idx_name:ident, $type_name:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $type_idx_name(u32);

        impl $type_idx_name {
            pub const fn new(index: usize) -> $type_idx_name {
                $type_idx_name(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn from_push(vec: &mut Vec<$type_name>, val: $type_name) -> $type_idx_name {
                let idx = $type_idx_name(vec.len() as u32);
                vec.push(val);
                idx
            }
        }

        impl std::fmt::Display for $type_idx_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::ops::Index<$type_idx_name> for [$type_name] {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl std::ops::IndexMut<$type_idx_name> for [$type_name] {
            fn index_mut(&mut self, index: $type_idx_name) -> &mut Self::Output {
                &mut self[index.0 as usize]
            }
        }

        impl std::ops::Index<$type_idx_name> for Vec<$type_name> {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                &self.as_slice()[index]
            }
        }

        impl std::ops::IndexMut<$type_idx_name> for Vec<$type_name> {
            fn index_mut(&mut self, index: $type_idx_name) -> &mut Self::Output {
                &mut self.as_mut_slice()[index]
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug, PartialEq)]
    struct Node(&'static str);

    make_type_idx!(NodeIdx, Node);

    #[test]
    fn push_then_index() {
        let mut nodes = Vec::new();
        let a = NodeIdx::from_push(&mut nodes, Node("a"));
        let b = NodeIdx::from_push(&mut nodes, Node("b"));

        assert_eq!(a.index(), 0);
        assert_eq!(b, NodeIdx::new(1));
        assert_eq!(nodes[b], Node("b"));
        assert_eq!(b.to_string(), "1");

        nodes[a] = Node("c");
        assert_eq!(nodes[a], Node("c"));
    }
}
