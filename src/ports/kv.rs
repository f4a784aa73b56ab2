pub trait KvStore: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type GetFut<'a>: Future<Output = Result<Option<String>, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type SetFut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn get<'a>(&'a self, key: &'a str) -> Self::GetFut<'a>;
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> Self::SetFut<'a>;
}
