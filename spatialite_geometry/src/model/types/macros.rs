/// Implements `From` conversions from vectors and array references for the
/// tuple-struct geometry types, so tests and callers can write
/// `LineStringGeometry::from(&[[0, 0], [1, 1]])`.
#[macro_export]
macro_rules! impl_from_array {
	($($t:ty,$i:ty),*) => {$(
		impl<T> From<Vec<T>> for $t
		where
			$i: From<T>,
		{
			fn from(value: Vec<T>) -> Self {
				Self(value.into_iter().map(<$i>::from).collect())
			}
		}

		impl<'a, T, const N: usize> From<&'a [T; N]> for $t
		where
			$i: From<&'a T>,
		{
			fn from(value: &'a [T; N]) -> Self {
				Self(value.iter().map(<$i>::from).collect())
			}
		}
	)*}
}
