pub type Point = (i32, i32);
pub type IndexMatch = (usize, usize);

/// Something with a notion of distance to another value of the same kind:
/// bit differences for descriptors, pixels for keypoint locations.
pub trait Matchable {
    fn distance(&self, other: &Self) -> usize;
}

/// Adaptive non-maximal suppression.
///
/// `vec` must be sorted by strength, strongest first. Each item gets a
/// suppression radius equal to its distance to the nearest stronger item;
/// the `n` items with the largest radii are returned in their original
/// (strength) order, which spreads the survivors evenly over the image.
pub fn adaptive_nonmax_suppression<T>(vec: &[T], n: usize) -> Vec<T>
where
    T: Matchable + Copy,
{
    if n >= vec.len() {
        return vec.to_vec();
    }

    let mut radii: Vec<(usize, usize)> = Vec::with_capacity(vec.len());
    for (i, item) in vec.iter().enumerate() {
        let radius = vec[..i]
            .iter()
            .map(|stronger| item.distance(stronger))
            .min()
            .unwrap_or(usize::MAX);
        radii.push((radius, i));
    }

    // stable: equal radii keep strength order
    radii.sort_by(|a, b| b.0.cmp(&a.0));

    let mut keep: Vec<usize> = radii.iter().take(n).map(|&(_, i)| i).collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| vec[i]).collect()
}
